//! Single-host diagnostics: open well-known ports, ICMP reachability and the
//! TTL the host answers with.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use latr_common::network::host::Inspection;
use latr_protocols::icmp::ReplyKind;
use tracing::debug;

use crate::network::icmp::EchoTransport;
use crate::network::tcp;
use crate::resolver::HostResolver;

/// TTL the reachability echo is sent with.
const ECHO_TTL: u8 = 64;

pub const WELL_KNOWN_PORTS: [u16; 12] = [21, 22, 23, 25, 53, 80, 110, 143, 443, 3306, 3389, 8080];

pub struct Inspector {
    echo: Option<Arc<dyn EchoTransport>>,
    resolver: Arc<dyn HostResolver>,
    ports: Vec<u16>,
    port_timeout: Duration,
    echo_timeout: Duration,
}

impl Inspector {
    /// Without an echo transport `reachable` and `ttl_observed` stay unset.
    pub fn new(
        echo: Option<Arc<dyn EchoTransport>>,
        resolver: Arc<dyn HostResolver>,
        port_timeout: Duration,
        echo_timeout: Duration,
    ) -> Self {
        Self {
            echo,
            resolver,
            ports: WELL_KNOWN_PORTS.to_vec(),
            port_timeout,
            echo_timeout,
        }
    }

    /// Replaces the scanned port set.
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Port scan, echo and reverse lookup run side by side; none of them can
    /// fail the inspection.
    pub async fn inspect(&self, address: IpAddr) -> Inspection {
        let (open_ports, echo, hostname) = tokio::join!(
            tcp::scan_ports(address, &self.ports, self.port_timeout),
            self.echo(address),
            self.resolver.reverse(address),
        );

        let (reachable, ttl_observed) = match echo {
            None => (None, None),
            Some(None) => (Some(false), None),
            Some(Some(ttl)) => (Some(true), Some(ttl)),
        };
        debug!("inspected {address}: {} open ports, reachable {reachable:?}", open_ports.len());

        Inspection {
            address,
            hostname,
            open_ports,
            reachable,
            ttl_observed,
        }
    }

    /// `None` when ICMP is not available for this address, otherwise the reply
    /// TTL if the host answered.
    async fn echo(&self, address: IpAddr) -> Option<Option<u8>> {
        let (Some(echo), IpAddr::V4(dst)) = (&self.echo, address) else {
            return None;
        };
        let reply = echo.echo(dst, ECHO_TTL, self.echo_timeout).await;
        Some(reply.filter(|r| r.kind == ReplyKind::EchoReply && r.responder == address).map(|r| r.ttl))
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
