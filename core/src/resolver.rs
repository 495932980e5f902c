//! Forward and reverse name resolution.
//!
//! Forward lookups are fallible per target; reverse lookups are best effort and
//! never fail the operation that asked for them.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use latr_common::network::target::Target;
use tokio::time::timeout;
use tracing::debug;

use crate::error::LatrError;

#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Turns a target into the address probes are sent to.
    async fn resolve(&self, target: &Target) -> Result<IpAddr, LatrError>;

    /// Best-effort PTR lookup.
    async fn reverse(&self, addr: IpAddr) -> Option<String>;
}

/// Resolver backed by the operating system's name service.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
    no_dns: bool,
}

impl SystemResolver {
    pub fn new(timeout: Duration, no_dns: bool) -> Self {
        Self { timeout, no_dns }
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, target: &Target) -> Result<IpAddr, LatrError> {
        let name: &str = match target {
            Target::Addr(addr) => return Ok(*addr),
            Target::Hostname(name) => name,
        };

        let failed = |reason: String| LatrError::Resolution {
            target: target.clone(),
            reason,
        };

        let addrs: Vec<IpAddr> = timeout(self.timeout, tokio::net::lookup_host((name, 0)))
            .await
            .map_err(|_| failed("lookup timed out".into()))?
            .map_err(|e| failed(e.to_string()))?
            .map(|socket| socket.ip())
            .collect();

        let chosen: IpAddr = pick_address(&addrs).ok_or_else(|| failed("no addresses returned".into()))?;
        debug!("resolved {name} to {chosen}");
        Ok(chosen)
    }

    async fn reverse(&self, addr: IpAddr) -> Option<String> {
        if self.no_dns {
            return None;
        }
        let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr));
        match timeout(self.timeout, lookup).await {
            Ok(Ok(Ok(name))) if name != addr.to_string() => Some(name),
            Ok(Ok(Ok(_))) => None,
            Ok(Ok(Err(e))) => {
                debug!("reverse lookup of {addr} failed: {e}");
                None
            }
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

/// First IPv4 address if there is one, since ICMP probing is IPv4 only.
fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
