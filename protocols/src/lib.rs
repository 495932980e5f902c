//! Wire formats spoken by the raw-socket probes.

pub mod icmp;
