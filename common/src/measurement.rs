//! # Measurement Models
//!
//! Plain data produced by a measurement round. Everything here is serializable so
//! export and rendering collaborators can consume it without touching the engine.

pub mod round;
pub mod sample;

pub use round::{LatencyGrade, MeasurementRound, TargetResult, ThroughputReport};
pub use sample::{Protocol, Sample, Summary};
