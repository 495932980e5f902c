//! # latr core
//!
//! Probe orchestration and statistics engine. [`engine::Engine`] is the entry
//! point for front ends; the components it wires together are public so they can
//! be driven (and tested) on their own.

pub mod engine;
pub mod error;
pub mod history;
pub mod inspect;
pub mod network;
pub mod orchestrator;
pub mod privilege;
pub mod prober;
pub mod resolver;
pub mod stats;
pub mod trace;

pub use engine::Engine;
pub use error::LatrError;
