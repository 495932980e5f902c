use std::net::IpAddr;

use serde::Serialize;

/// Diagnostic snapshot of a single host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub address: IpAddr,
    /// Best-effort reverse DNS name.
    pub hostname: Option<String>,
    /// Well-known TCP ports that accepted a connection, ascending.
    pub open_ports: Vec<u16>,
    /// Whether an ICMP echo was answered. `None` when raw sockets are unavailable.
    pub reachable: Option<bool>,
    /// TTL of the echo reply as it arrived. `None` without a reply.
    pub ttl_observed: Option<u8>,
}
