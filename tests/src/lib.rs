//! Loopback integration tests for the measurement engine.

#[cfg(test)]
mod measurement;
