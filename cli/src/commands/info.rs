use colored::*;
use is_root::is_root;
use latr_common::config::Config;
use latr_common::network::privilege::PrivilegeMode;
use latr_core::Engine;

use crate::lprint;
use crate::terminal::{colors, print::{self, GLOBAL_KEY_WIDTH}};

pub fn info(engine: &Engine) {
    print::print(&format!(
        "{}",
        "Latr measures latency, jitter and loss to a handful of hosts.".color(colors::TEXT_DEFAULT)
    ));
    lprint!();
    GLOBAL_KEY_WIDTH.set(12);

    print_about_the_tool();
    print_privileges(engine.privilege_mode());
    print_defaults(engine.config());
    print::end_of_program();
}

fn print_about_the_tool() {
    print::aligned_line("Version", env!("CARGO_PKG_VERSION"));
    print::aligned_line("License", "MIT");
}

fn print_privileges(mode: PrivilegeMode) {
    print::header("privileges");
    print::aligned_line("Root", if is_root() { "yes" } else { "no" });
    match mode {
        PrivilegeMode::Raw => {
            print::aligned_line("Probing", "ICMP echo".color(colors::GRADE_LOW));
            print::aligned_line("Traceroute", "available".color(colors::GRADE_LOW));
        }
        PrivilegeMode::Unprivileged => {
            print::aligned_line("Probing", "TCP handshake".color(colors::GRADE_MEDIUM));
            print::aligned_line("Traceroute", "unavailable".color(colors::GRADE_HIGH));
            lprint!();
            print::print_status(
                "Without raw sockets latency is the time of a TCP handshake to port 80 or 443. \
                 It includes connection setup and is not comparable to ping times.",
            );
        }
    }
}

fn print_defaults(config: &Config) {
    print::header("defaults");
    print::aligned_line("Pings", config.default_pings.to_string());
    print::aligned_line("Timeout", format!("{} ms", config.probe_timeout.as_millis()));
    print::aligned_line("Max hops", config.max_hops.to_string());
    let ports: Vec<String> = config.tcp_ports.iter().map(u16::to_string).collect();
    print::aligned_line("TCP ports", ports.join(", "));
}
