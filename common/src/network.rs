pub mod hop;
pub mod host;
pub mod privilege;
pub mod target;
