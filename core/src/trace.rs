//! TTL-stepping path discovery over ICMP echo.
//!
//! Each hop gets exactly one probe. Silent hops are recorded and skipped; the
//! walk stops when the destination answers or `max_hops` is used up, and both
//! count as success.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use latr_common::network::hop::HopResult;
use latr_common::network::privilege::PrivilegeMode;
use latr_common::network::target::Target;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::LatrError;
use crate::network::icmp::EchoTransport;
use crate::resolver::HostResolver;

pub struct HopWalker {
    mode: PrivilegeMode,
    echo: Option<Arc<dyn EchoTransport>>,
    resolver: Arc<dyn HostResolver>,
}

impl HopWalker {
    pub fn new(
        mode: PrivilegeMode,
        echo: Option<Arc<dyn EchoTransport>>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        Self { mode, echo, resolver }
    }

    pub async fn trace(
        &self,
        destination: &Target,
        max_hops: u8,
        hop_timeout: Duration,
    ) -> Result<Vec<HopResult>, LatrError> {
        self.trace_with(destination, max_hops, hop_timeout, None, CancellationToken::new())
            .await
    }

    /// Like [`HopWalker::trace`], additionally streaming every hop as soon as it
    /// is known. Cancellation is checked between hops.
    pub async fn trace_with(
        &self,
        destination: &Target,
        max_hops: u8,
        hop_timeout: Duration,
        hops_tx: Option<mpsc::UnboundedSender<HopResult>>,
        cancel: CancellationToken,
    ) -> Result<Vec<HopResult>, LatrError> {
        let echo: &dyn EchoTransport = match (&self.echo, self.mode.allows_raw()) {
            (Some(echo), true) => echo.as_ref(),
            _ => return Err(LatrError::InsufficientPrivilege),
        };
        if max_hops == 0 {
            return Err(LatrError::InvalidParameter("max hops must be at least 1".into()));
        }

        let dst: Ipv4Addr = match self.resolver.resolve(destination).await? {
            IpAddr::V4(dst) => dst,
            IpAddr::V6(addr) => {
                return Err(LatrError::InvalidParameter(format!(
                    "traceroute supports IPv4 destinations only, {destination} resolved to {addr}"
                )));
            }
        };
        debug!("tracing {destination} ({dst}) over at most {max_hops} hops");

        let mut hops: Vec<HopResult> = Vec::new();
        for ttl in 1..=max_hops {
            if cancel.is_cancelled() {
                return Err(LatrError::Cancelled);
            }

            let hop: HopResult = match echo.echo(dst, ttl, hop_timeout).await {
                Some(reply) => {
                    let hostname: Option<String> = self.resolver.reverse(reply.responder).await;
                    let latency_ms: f64 = reply.rtt.as_nanos() as f64 / 1_000_000.0;
                    HopResult::responded(ttl, reply.responder, hostname, latency_ms)
                }
                None => HopResult::silent(ttl),
            };
            let reached: bool = hop.address == Some(IpAddr::V4(dst));

            if let Some(tx) = &hops_tx {
                let _ = tx.send(hop.clone());
            }
            hops.push(hop);

            if reached {
                break;
            }
        }

        Ok(hops)
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
    use async_trait::async_trait;
    use latr_protocols::icmp::ReplyKind;
    use parking_lot::Mutex;
    use std::net::Ipv6Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DEST: Ipv4Addr = Ipv4Addr::new(198, 51, 100, 7);

    /// Simulated path: hop `n` is answered by `10.0.0.n` with a time-exceeded,
    /// except for silent hops, until `dest_at` where the destination replies.
    struct FakePath {
        dest_at: Option<u8>,
        silent: Vec<u8>,
        sent: AtomicUsize,
    }

    impl FakePath {
        fn new(dest_at: Option<u8>, silent: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                dest_at,
                silent,
                sent: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EchoTransport for FakePath {
        async fn echo(&self, dst: Ipv4Addr, ttl: u8, _timeout: Duration) -> Option<EchoReply> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.silent.contains(&ttl) {
                return None;
            }
            let (kind, responder) = match self.dest_at {
                Some(at) if ttl >= at => (ReplyKind::EchoReply, dst),
                _ => (ReplyKind::TimeExceeded, Ipv4Addr::new(10, 0, 0, ttl)),
            };
            Some(EchoReply {
                kind,
                responder: IpAddr::V4(responder),
                ttl: 64 - ttl,
                rtt: Duration::from_millis(u64::from(ttl) * 5),
            })
        }
    }

    /// Resolves a fixed table and names `10.0.0.1` only.
    struct FakeResolver {
        lookups: Mutex<Vec<Target>>,
    }

    impl FakeResolver {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                lookups: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HostResolver for FakeResolver {
        async fn resolve(&self, target: &Target) -> Result<IpAddr, LatrError> {
            self.lookups.lock().push(target.clone());
            match target {
                Target::Addr(addr) => Ok(*addr),
                Target::Hostname(name) if name == "dest.test" => Ok(IpAddr::V4(DEST)),
                Target::Hostname(name) if name == "v6.test" => Ok(IpAddr::V6(Ipv6Addr::LOCALHOST)),
                _ => Err(LatrError::Resolution {
                    target: target.clone(),
                    reason: "unknown host".into(),
                }),
            }
        }

        async fn reverse(&self, addr: IpAddr) -> Option<String> {
            (addr == IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))).then(|| "gateway.lan".to_string())
        }
    }

    fn walker(path: Arc<FakePath>, resolver: Arc<FakeResolver>) -> HopWalker {
        HopWalker::new(PrivilegeMode::Raw, Some(path), resolver)
    }

    #[tokio::test]
    async fn stops_at_destination() {
        let path = FakePath::new(Some(4), vec![2]);
        let hops = walker(path.clone(), FakeResolver::new())
            .trace(&Target::Hostname("dest.test".into()), 30, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(hops.len(), 4);
        assert_eq!(path.sent.load(Ordering::SeqCst), 4);
        assert_eq!(hops[0].hostname.as_deref(), Some("gateway.lan"));
        assert!(hops[1].is_silent());
        assert_eq!(hops[2].hostname.as_deref(), Some("10.0.0.3"));
        assert_eq!(hops[3].address, Some(IpAddr::V4(DEST)));
        assert_eq!(hops[3].latency_ms, Some(20.0));
        let indexes: Vec<u8> = hops.iter().map(|h| h.hop).collect();
        assert_eq!(indexes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn exhausting_max_hops_is_not_an_error() {
        let path = FakePath::new(None, vec![3]);
        let hops = walker(path, FakeResolver::new())
            .trace(&Target::Addr(IpAddr::V4(DEST)), 3, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(hops.len(), 3);
        assert!(hops[2].is_silent());
    }

    #[tokio::test]
    async fn unprivileged_trace_fails_before_any_work() {
        let path = FakePath::new(Some(1), vec![]);
        let resolver = FakeResolver::new();
        let walker = HopWalker::new(PrivilegeMode::Unprivileged, Some(path.clone()), resolver.clone());

        let result = walker
            .trace(&Target::Hostname("unreachable-host".into()), 5, Duration::from_millis(10))
            .await;

        assert!(matches!(result, Err(LatrError::InsufficientPrivilege)));
        assert_eq!(path.sent.load(Ordering::SeqCst), 0);
        assert!(resolver.lookups.lock().is_empty());
    }

    #[tokio::test]
    async fn unresolvable_destination_fails() {
        let path = FakePath::new(Some(1), vec![]);
        let result = walker(path.clone(), FakeResolver::new())
            .trace(&Target::Hostname("nowhere.test".into()), 5, Duration::from_millis(10))
            .await;

        assert!(matches!(result, Err(LatrError::Resolution { .. })));
        assert_eq!(path.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ipv6_destination_and_zero_hops_are_rejected() {
        let walker = walker(FakePath::new(Some(1), vec![]), FakeResolver::new());

        let v6 = walker
            .trace(&Target::Hostname("v6.test".into()), 5, Duration::from_millis(10))
            .await;
        assert!(matches!(v6, Err(LatrError::InvalidParameter(_))));

        let zero = walker
            .trace(&Target::Addr(IpAddr::V4(DEST)), 0, Duration::from_millis(10))
            .await;
        assert!(matches!(zero, Err(LatrError::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn streams_hops_and_honours_cancellation() {
        let walker = walker(FakePath::new(None, vec![]), FakeResolver::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let streamed = walker
            .trace_with(&Target::Addr(IpAddr::V4(DEST)), 2, Duration::from_millis(10), Some(tx), CancellationToken::new())
            .await
            .unwrap();
        let mut received = Vec::new();
        while let Ok(hop) = rx.try_recv() {
            received.push(hop);
        }
        assert_eq!(received, streamed);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let cancelled = walker
            .trace_with(&Target::Addr(IpAddr::V4(DEST)), 5, Duration::from_millis(10), None, cancel)
            .await;
        assert!(matches!(cancelled, Err(LatrError::Cancelled)));
    }
}
