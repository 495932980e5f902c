use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::trace;

/// Times a full TCP handshake. `None` when the connect fails or times out.
///
/// A refused connection still proves the host is up, but its timing says more
/// about the RST path than about latency, so it is not counted.
pub async fn handshake(addr: SocketAddr, probe_timeout: Duration) -> Option<Duration> {
    let start: Instant = Instant::now();
    match timeout(probe_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Some(start.elapsed()),
        Ok(Err(e)) => {
            trace!("handshake with {addr} failed: {e}");
            None
        }
        Err(_elapsed) => None,
    }
}

/// Tries every port concurrently and returns the ones that accepted, ascending.
pub async fn scan_ports(ip: IpAddr, ports: &[u16], port_timeout: Duration) -> Vec<u16> {
    let mut set: JoinSet<Option<u16>> = JoinSet::new();
    for &port in ports {
        set.spawn(async move {
            handshake(SocketAddr::new(ip, port), port_timeout)
                .await
                .map(|_| port)
        });
    }

    let mut open: Vec<u16> = Vec::new();
    while let Some(joined) = set.join_next().await {
        if let Ok(Some(port)) = joined {
            open.push(port);
        }
    }
    open.sort_unstable();
    open.dedup();
    open
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
