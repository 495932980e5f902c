use std::time::Duration;

/// Fallback ports for unprivileged probing, tried in order.
pub const DEFAULT_TCP_PORTS: [u16; 2] = [80, 443];

/// Settings injected into the engine.
///
/// The orchestrator snapshots this once per round, so changing it never affects
/// a round that is already running.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pings per target when the caller does not ask for a specific count.
    pub default_pings: u32,
    /// How long a single ICMP echo or TCP handshake may take.
    pub probe_timeout: Duration,
    /// Pause between two consecutive probes against the same target.
    pub probe_interval: Duration,
    /// Upper bound of TTL values walked by a traceroute.
    pub max_hops: u8,
    /// How long to wait for each hop to answer.
    pub hop_timeout: Duration,
    /// Connect timeout used by the port inspection.
    pub port_timeout: Duration,
    /// Upper bound for forward and reverse DNS lookups.
    pub resolve_timeout: Duration,
    /// Ports used by the TCP handshake fallback, in the order they are tried.
    pub tcp_ports: Vec<u16>,
    /// How many targets of a round may be probed at the same time.
    pub parallel_targets: usize,
    /// Disables reverse DNS lookups.
    ///
    /// Hops and inspections then report the bare address.
    pub no_dns: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_pings: 5,
            probe_timeout: Duration::from_secs(2),
            probe_interval: Duration::from_millis(100),
            max_hops: 30,
            hop_timeout: Duration::from_secs(2),
            port_timeout: Duration::from_millis(500),
            resolve_timeout: Duration::from_secs(2),
            tcp_ports: DEFAULT_TCP_PORTS.to_vec(),
            parallel_targets: 1,
            no_dns: false,
        }
    }
}
