//! Facade handed to front ends.
//!
//! Owns the privilege decision, the shared ICMP channel and one orchestrator,
//! and exposes every operation a UI or transport layer needs.

use std::net::IpAddr;
use std::sync::Arc;

use latr_common::config::Config;
use latr_common::measurement::MeasurementRound;
use latr_common::network::hop::HopResult;
use latr_common::network::host::Inspection;
use latr_common::network::privilege::PrivilegeMode;
use latr_common::network::target::Target;
use latr_common::warn;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::LatrError;
use crate::inspect::Inspector;
use crate::network::icmp::{EchoTransport, IcmpChannel};
use crate::orchestrator::{MeasurementOrchestrator, RoundEvent, RoundHandle};
use crate::privilege;
use crate::prober::{LatencyProbe, Prober};
use crate::resolver::{HostResolver, SystemResolver};
use crate::trace::HopWalker;

pub struct Engine {
    mode: PrivilegeMode,
    config: Arc<Config>,
    resolver: Arc<dyn HostResolver>,
    orchestrator: MeasurementOrchestrator,
    walker: HopWalker,
    inspector: Inspector,
}

impl Engine {
    /// Detects privilege and opens the ICMP channel if allowed.
    ///
    /// Must be called from within a tokio runtime. When the channel cannot be
    /// opened after all, the engine continues unprivileged.
    pub fn start(config: Config) -> Self {
        let detected: PrivilegeMode = privilege::detect();
        let echo: Option<Arc<dyn EchoTransport>> = match detected {
            PrivilegeMode::Raw => match IcmpChannel::open() {
                Ok(channel) => {
                    let channel: Arc<dyn EchoTransport> = Arc::new(channel);
                    Some(channel)
                }
                Err(e) => {
                    warn!("Could not open ICMP channel, falling back to TCP: {}", LatrError::from(e));
                    None
                }
            },
            PrivilegeMode::Unprivileged => None,
        };
        let mode: PrivilegeMode = if echo.is_some() {
            PrivilegeMode::Raw
        } else {
            PrivilegeMode::Unprivileged
        };

        let resolver = Arc::new(SystemResolver::new(config.resolve_timeout, config.no_dns));
        Self::with_parts(config, mode, echo, resolver)
    }

    /// Builds an engine from explicit components.
    pub fn with_parts(
        config: Config,
        mode: PrivilegeMode,
        echo: Option<Arc<dyn EchoTransport>>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        let config: Arc<Config> = Arc::new(config);
        let echo: Option<Arc<dyn EchoTransport>> = echo.filter(|_| mode.allows_raw());

        let prober: Arc<dyn LatencyProbe> = Arc::new(Prober::new(echo.clone(), config.tcp_ports.clone()));
        let orchestrator = MeasurementOrchestrator::new(prober, resolver.clone(), config.clone());
        let walker = HopWalker::new(mode, echo.clone(), resolver.clone());
        let inspector = Inspector::new(echo, resolver.clone(), config.port_timeout, config.probe_timeout);

        Self {
            mode,
            config,
            resolver,
            orchestrator,
            walker,
            inspector,
        }
    }

    pub fn privilege_mode(&self) -> PrivilegeMode {
        self.mode
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `pings_per_target` falls back to the configured default when `None`.
    pub fn start_round(
        &self,
        targets: Vec<Target>,
        pings_per_target: Option<u32>,
        cancel: CancellationToken,
    ) -> Result<RoundHandle, LatrError> {
        let pings: u32 = pings_per_target.unwrap_or(self.config.default_pings);
        self.orchestrator.start_round(targets, pings, cancel)
    }

    pub async fn run_round(
        &self,
        targets: Vec<Target>,
        pings_per_target: Option<u32>,
        events: Option<mpsc::UnboundedSender<RoundEvent>>,
        cancel: CancellationToken,
    ) -> Result<MeasurementRound, LatrError> {
        let pings: u32 = pings_per_target.unwrap_or(self.config.default_pings);
        self.orchestrator.run_round(targets, pings, events, cancel).await
    }

    pub fn history(&self) -> Vec<MeasurementRound> {
        self.orchestrator.history().snapshot()
    }

    pub fn clear_history(&self) {
        self.orchestrator.history().clear();
    }

    pub fn current_round(&self) -> Option<MeasurementRound> {
        self.orchestrator.current_round()
    }

    pub fn clear_current_round(&self) {
        self.orchestrator.clear_current_round();
    }

    /// `max_hops` falls back to the configured limit when `None`.
    pub async fn traceroute(
        &self,
        destination: &Target,
        max_hops: Option<u8>,
        hops_tx: Option<mpsc::UnboundedSender<HopResult>>,
        cancel: CancellationToken,
    ) -> Result<Vec<HopResult>, LatrError> {
        let max_hops: u8 = max_hops.unwrap_or(self.config.max_hops);
        self.walker
            .trace_with(destination, max_hops, self.config.hop_timeout, hops_tx, cancel)
            .await
    }

    pub async fn inspect(&self, address: IpAddr) -> Inspection {
        self.inspector.inspect(address).await
    }

    pub async fn resolve(&self, target: &Target) -> Result<IpAddr, LatrError> {
        self.resolver.resolve(target).await
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
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn unprivileged() -> Engine {
        let config = Config {
            probe_timeout: Duration::from_millis(200),
            probe_interval: Duration::ZERO,
            ..Config::default()
        };
        let resolver = Arc::new(SystemResolver::new(Duration::from_secs(1), true));
        Engine::with_parts(config, PrivilegeMode::Unprivileged, None, resolver)
    }

    #[tokio::test]
    async fn unprivileged_engine_refuses_traceroute() {
        let engine = unprivileged();
        assert_eq!(engine.privilege_mode(), PrivilegeMode::Unprivileged);

        let result = engine
            .traceroute(&Target::Hostname("unreachable-host".into()), Some(5), None, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(LatrError::InsufficientPrivilege)));
    }

    #[tokio::test]
    async fn default_ping_count_comes_from_config() {
        let engine = unprivileged();
        let round = engine
            .run_round(vec![Target::Hostname("no-such-host.invalid".into())], None, None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(round.pings_per_target, engine.config().default_pings);
        assert_eq!(round.results[0].samples.len(), engine.config().default_pings as usize);
        assert_eq!(engine.history().len(), 1);

        engine.clear_history();
        engine.clear_current_round();
        assert!(engine.history().is_empty());
        assert!(engine.current_round().is_none());
    }

    #[tokio::test]
    async fn inspect_without_privilege_leaves_reachability_unset() {
        let engine = unprivileged();
        let inspection = engine.inspect(IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        assert_eq!(inspection.reachable, None);
    }
}
