//! Console logging macros.
//!
//! These forward to `tracing` under dedicated targets so the CLI formatter can
//! pick a symbol per kind of message while library code stays subscriber agnostic.

pub const TARGET_INFO: &str = "latr::info";
pub const TARGET_SUCCESS: &str = "latr::success";
pub const TARGET_WARN: &str = "latr::warn";
pub const TARGET_ERROR: &str = "latr::error";

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: "latr::info", $($arg)*)
    };
}

#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: "latr::success", $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!(target: "latr::warn", $($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__tracing::error!(target: "latr::error", $($arg)*)
    };
}
