use std::net::IpAddr;

use serde::Serialize;

/// One TTL step of a traceroute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopResult {
    /// 1-based hop index, equal to the TTL the probe was sent with.
    pub hop: u8,
    /// The router (or destination) that answered, `None` when nothing did.
    pub address: Option<IpAddr>,
    /// Reverse DNS name of `address`, or the address itself when the lookup failed.
    pub hostname: Option<String>,
    /// Round trip time of the answering probe.
    pub latency_ms: Option<f64>,
}

impl HopResult {
    /// A hop that stayed silent until the timeout.
    pub fn silent(hop: u8) -> Self {
        Self {
            hop,
            address: None,
            hostname: None,
            latency_ms: None,
        }
    }

    pub fn responded(hop: u8, address: IpAddr, hostname: Option<String>, latency_ms: f64) -> Self {
        Self {
            hop,
            address: Some(address),
            hostname: Some(hostname.unwrap_or_else(|| address.to_string())),
            latency_ms: Some(latency_ms),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.address.is_none()
    }
}
