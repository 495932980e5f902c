use latr_common::measurement::MeasurementRound;
use latr_common::network::target::Target;
use thiserror::Error;

/// Operation-level failures.
///
/// A probe that times out is not an error; it is recorded as
/// [`Sample::NoResponse`](latr_common::measurement::Sample::NoResponse).
#[derive(Debug, Error)]
pub enum LatrError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("could not resolve {target}: {reason}")]
    Resolution { target: Target, reason: String },

    #[error("raw socket privilege is required for this operation")]
    InsufficientPrivilege,

    #[error("a measurement round is already in progress")]
    RoundInProgress,

    #[error("operation cancelled")]
    Cancelled,

    #[error("measurement round failed: {reason}")]
    RoundFailed {
        reason: String,
        partial: Box<MeasurementRound>,
    },

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}
