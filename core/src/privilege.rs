use std::sync::OnceLock;

use latr_common::network::privilege::PrivilegeMode;
use latr_common::warn;

use crate::network::transport;

static MODE: OnceLock<PrivilegeMode> = OnceLock::new();

/// Probes for raw socket access once per process; later calls return the
/// cached answer.
pub fn detect() -> PrivilegeMode {
    *MODE.get_or_init(|| {
        if transport::can_open_raw_icmp() {
            PrivilegeMode::Raw
        } else {
            if is_root::is_root() {
                warn!("Running as root but raw ICMP sockets are unavailable");
            }
            PrivilegeMode::Unprivileged
        }
    })
}
