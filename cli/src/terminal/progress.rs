//! Progress bars attached to tracing spans, so log lines printed meanwhile
//! never tear them.

use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const BAR_TEMPLATE: &str = "{spinner:.blue} [{bar:32.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.blue} {msg}";
const TICKS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
    "▁▁▁▁▁",
];

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
        .tick_strings(TICKS)
}

/// A bar counting probes of one round. Hidden in quiet mode.
pub fn round_bar(total_probes: u64, quiet: bool) -> Span {
    if quiet {
        return Span::none();
    }
    let span = info_span!("round", indicatif.pb_show = true);
    span.pb_set_style(&style(BAR_TEMPLATE));
    span.pb_set_length(total_probes);
    span
}

/// A spinner for work of unknown length.
pub fn spinner(message: &str, quiet: bool) -> Span {
    if quiet {
        return Span::none();
    }
    let span = info_span!("spinner", indicatif.pb_show = true);
    span.pb_set_style(&style(SPINNER_TEMPLATE));
    span.pb_set_message(message);
    span
}
