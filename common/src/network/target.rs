//! # Probe Target Model
//!
//! Defines the possible inputs for a measurement.
//!
//! A target is whatever the operator typed for one destination:
//! * A literal IPv4/IPv6 address (e.g., `8.8.8.8`, `2606:4700::1111`).
//! * A hostname (e.g., `one.one.one.one`), resolved right before probing.
//!
//! Several targets arrive as one comma separated list (e.g., `8.8.8.8, 1.1.1.1`).

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Longest name accepted by DNS, excluding the trailing dot.
const MAX_HOSTNAME_LEN: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("target cannot be empty")]
    Empty,
    #[error("hostname is longer than {} characters", MAX_HOSTNAME_LEN)]
    TooLong,
    #[error("invalid target: {0}")]
    Invalid(String),
    #[error("failed to parse target '{entry}': {source}")]
    InList {
        entry: String,
        source: Box<TargetError>,
    },
}

/// A single destination to probe.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// A literal address, no resolution needed.
    Addr(IpAddr),
    /// A hostname that still has to be resolved.
    Hostname(String),
}

impl Target {
    /// Returns the address directly when no lookup is required.
    pub fn as_addr(&self) -> Option<IpAddr> {
        match self {
            Target::Addr(addr) => Some(*addr),
            Target::Hostname(_) => None,
        }
    }
}

impl From<IpAddr> for Target {
    fn from(addr: IpAddr) -> Self {
        Target::Addr(addr)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Addr(addr) => write!(f, "{addr}"),
            Target::Hostname(name) => f.write_str(name),
        }
    }
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Target {
    type Err = TargetError;

    /// Parses a string into a `Target`.
    ///
    /// Surrounding whitespace is ignored. Anything that is not an IP address must
    /// look like a hostname: dot separated labels of letters, digits, `-` and `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() {
            return Err(TargetError::Empty);
        }

        if let Some(target) = parse_host(s) {
            return Ok(target);
        }

        parse_hostname(s)
    }
}

/// Parses a comma separated list of targets (e.g., "8.8.8.8, 1.1.1.1, example.com").
///
/// Empty entries are skipped and repeated targets keep only their first position,
/// so the result may be empty. Rejecting an empty list is up to the caller.
pub fn parse_list(s: &str) -> Result<Vec<Target>, TargetError> {
    let mut targets: Vec<Target> = Vec::new();

    for part in s.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let target = Target::from_str(part).map_err(|e| TargetError::InList {
            entry: part.to_string(),
            source: Box::new(e),
        })?;

        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    Ok(targets)
}

/// Parses a single IP address.
fn parse_host(s: &str) -> Option<Target> {
    s.parse::<IpAddr>().ok().map(Target::Addr)
}

fn parse_hostname(s: &str) -> Result<Target, TargetError> {
    let name = s.strip_suffix('.').unwrap_or(s);

    if name.len() > MAX_HOSTNAME_LEN {
        return Err(TargetError::TooLong);
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(TargetError::Invalid(s.to_string()));
        }
        let valid = label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid || label.starts_with('-') || label.ends_with('-') {
            return Err(TargetError::Invalid(s.to_string()));
        }
    }

    Ok(Target::Hostname(name.to_ascii_lowercase()))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
