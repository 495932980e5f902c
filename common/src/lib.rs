//! # latr common
//!
//! Shared vocabulary of the workspace: the measurement models handed between the
//! core engine and its front ends, the injected [`config::Config`], and the
//! console logging macros.

pub mod config;
pub mod log;
pub mod measurement;
pub mod network;

#[doc(hidden)]
pub use tracing as __tracing;
