use serde::Serialize;

/// Whether the process may open raw ICMP sockets.
///
/// Determined once at startup and never changed afterwards. Without raw sockets
/// latency probes fall back to timing TCP handshakes and traceroute is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeMode {
    /// Raw ICMP sockets are available.
    Raw,
    /// Only ordinary sockets are available.
    Unprivileged,
}

impl PrivilegeMode {
    pub fn allows_raw(self) -> bool {
        matches!(self, PrivilegeMode::Raw)
    }
}
