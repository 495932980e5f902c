use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Outcome of one probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Round trip time in milliseconds.
    Success(f64),
    /// Timed out, refused, or answered with an ICMP error.
    NoResponse,
}

impl Sample {
    pub fn from_rtt(rtt: Duration) -> Self {
        Sample::Success(rtt.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn latency_ms(self) -> Option<f64> {
        match self {
            Sample::Success(ms) => Some(ms),
            Sample::NoResponse => None,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Sample::Success(_))
    }
}

/// Serialized as the latency in milliseconds, or `null` for a lost probe.
impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Sample::Success(ms) => serializer.serialize_some(ms),
            Sample::NoResponse => serializer.serialize_none(),
        }
    }
}

/// Wire protocol a latency figure was obtained with.
///
/// TCP figures include the handshake cost, so they are not directly comparable to
/// ICMP echo times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Icmp,
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Icmp => f.write_str("ICMP"),
            Protocol::Tcp => f.write_str("TCP"),
        }
    }
}

/// Statistics derived from one target's samples.
///
/// Latency figures are in milliseconds and only cover successful samples; they are
/// all zero when nothing answered.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Summary {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub stdev: f64,
    pub jitter: f64,
    /// Fraction of probes without a response, `0.0..=1.0`.
    pub packet_loss: f64,
    /// Bandwidth-delay-product guess in Mbps assuming a 64 KiB window.
    ///
    /// An order of magnitude hint derived from latency alone, never a measured
    /// bandwidth.
    pub throughput_estimate: f64,
}
