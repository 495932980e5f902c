//! Single reachability probes.
//!
//! With raw socket privilege a probe is one ICMP echo. Without it the handshake
//! time of a TCP connect stands in, trying the configured ports in order. The
//! protocol is reported next to every result because the two are not directly
//! comparable.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use latr_common::measurement::{Protocol, Sample};
use latr_protocols::icmp::ReplyKind;
use tracing::debug;

use crate::network::icmp::EchoTransport;
use crate::network::tcp;

/// TTL used for latency probes.
const PROBE_TTL: u8 = 64;

#[async_trait]
pub trait LatencyProbe: Send + Sync {
    /// Issues one probe. Failures of any kind are a [`Sample::NoResponse`].
    async fn probe(&self, ip: IpAddr, timeout: Duration) -> Sample;

    /// Protocol `probe` uses for this address.
    fn protocol_for(&self, ip: IpAddr) -> Protocol;
}

pub struct Prober {
    icmp: Option<Arc<dyn EchoTransport>>,
    tcp_ports: Vec<u16>,
}

impl Prober {
    /// `icmp` is only present when the process holds raw socket privilege.
    pub fn new(icmp: Option<Arc<dyn EchoTransport>>, tcp_ports: Vec<u16>) -> Self {
        Self { icmp, tcp_ports }
    }

    async fn probe_icmp(&self, echo: &dyn EchoTransport, ip: IpAddr, timeout: Duration) -> Sample {
        let IpAddr::V4(dst) = ip else {
            return Sample::NoResponse;
        };
        match echo.echo(dst, PROBE_TTL, timeout).await {
            Some(reply) if reply.kind == ReplyKind::EchoReply && reply.responder == ip => {
                Sample::from_rtt(reply.rtt)
            }
            Some(reply) => {
                debug!("{ip}: {:?} from {}", reply.kind, reply.responder);
                Sample::NoResponse
            }
            None => Sample::NoResponse,
        }
    }

    async fn probe_tcp(&self, ip: IpAddr, timeout: Duration) -> Sample {
        for &port in &self.tcp_ports {
            if let Some(rtt) = tcp::handshake(SocketAddr::new(ip, port), timeout).await {
                return Sample::from_rtt(rtt);
            }
        }
        Sample::NoResponse
    }
}

#[async_trait]
impl LatencyProbe for Prober {
    async fn probe(&self, ip: IpAddr, timeout: Duration) -> Sample {
        let sample: Sample = match (&self.icmp, ip) {
            (Some(echo), IpAddr::V4(_)) => self.probe_icmp(echo.as_ref(), ip, timeout).await,
            _ => self.probe_tcp(ip, timeout).await,
        };
        debug!("probe {ip} ({}): {sample:?}", self.protocol_for(ip));
        sample
    }

    fn protocol_for(&self, ip: IpAddr) -> Protocol {
        match (&self.icmp, ip) {
            (Some(_), IpAddr::V4(_)) => Protocol::Icmp,
            _ => Protocol::Tcp,
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::icmp::EchoReply;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use tokio::net::TcpListener;

    const TARGET: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);
    const ROUTER: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 1);

    /// Answers every echo with a fixed reply.
    struct FixedEcho(Option<EchoReply>);

    #[async_trait]
    impl EchoTransport for FixedEcho {
        async fn echo(&self, _dst: Ipv4Addr, _ttl: u8, _timeout: Duration) -> Option<EchoReply> {
            self.0
        }
    }

    fn reply(kind: ReplyKind, from: Ipv4Addr, rtt_ms: u64) -> Option<EchoReply> {
        Some(EchoReply {
            kind,
            responder: IpAddr::V4(from),
            ttl: 57,
            rtt: Duration::from_millis(rtt_ms),
        })
    }

    fn icmp_prober(echo: FixedEcho) -> Prober {
        Prober::new(Some(Arc::new(echo)), vec![])
    }

    #[tokio::test]
    async fn echo_reply_from_target_is_a_sample() {
        let prober = icmp_prober(FixedEcho(reply(ReplyKind::EchoReply, TARGET, 12)));
        let sample = prober.probe(IpAddr::V4(TARGET), Duration::from_secs(1)).await;
        assert_eq!(sample, Sample::Success(12.0));
        assert_eq!(prober.protocol_for(IpAddr::V4(TARGET)), Protocol::Icmp);
    }

    #[tokio::test]
    async fn icmp_error_is_no_response() {
        let prober = icmp_prober(FixedEcho(reply(ReplyKind::DestinationUnreachable, ROUTER, 3)));
        let sample = prober.probe(IpAddr::V4(TARGET), Duration::from_secs(1)).await;
        assert_eq!(sample, Sample::NoResponse);
    }

    #[tokio::test]
    async fn timeout_is_no_response() {
        let prober = icmp_prober(FixedEcho(None));
        let sample = prober.probe(IpAddr::V4(TARGET), Duration::from_millis(10)).await;
        assert_eq!(sample, Sample::NoResponse);
    }

    #[tokio::test]
    async fn ipv6_always_uses_tcp() {
        let prober = icmp_prober(FixedEcho(reply(ReplyKind::EchoReply, TARGET, 1)));
        assert_eq!(prober.protocol_for(IpAddr::V6(Ipv6Addr::LOCALHOST)), Protocol::Tcp);
    }

    #[tokio::test]
    async fn tcp_fallback_tries_next_port() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let tmp = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            tmp.local_addr().unwrap().port()
        };

        let prober = Prober::new(None, vec![closed, open]);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert_eq!(prober.protocol_for(ip), Protocol::Tcp);
        assert!(prober.probe(ip, Duration::from_secs(1)).await.is_success());
    }

    #[tokio::test]
    async fn tcp_fallback_without_listener_is_no_response() {
        let closed = {
            let tmp = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            tmp.local_addr().unwrap().port()
        };
        let prober = Prober::new(None, vec![closed]);
        let sample = prober.probe(IpAddr::V4(Ipv4Addr::LOCALHOST), Duration::from_secs(1)).await;
        assert_eq!(sample, Sample::NoResponse);
    }
}
