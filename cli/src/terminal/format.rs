use colored::*;
use latr_common::measurement::{LatencyGrade, TargetResult};

use crate::terminal::colors;

pub fn grade_color(grade: LatencyGrade) -> Color {
    match grade {
        LatencyGrade::Low => colors::GRADE_LOW,
        LatencyGrade::Medium => colors::GRADE_MEDIUM,
        LatencyGrade::High => colors::GRADE_HIGH,
        LatencyGrade::Unreachable => colors::UNREACHABLE,
    }
}

pub fn ms(value: f64) -> String {
    format!("{value:.2} ms")
}

pub fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

pub fn mbps(value: f64) -> String {
    format!("{value:.2} Mbps")
}

pub fn optional_ms(value: Option<f64>) -> String {
    value.map_or_else(|| "*".to_string(), ms)
}

/// Average latency coloured by its grade, or a dash when nothing answered.
pub fn graded_avg(result: &TargetResult) -> ColoredString {
    let grade: LatencyGrade = result.grade();
    let text: String = match grade {
        LatencyGrade::Unreachable => "unreachable".to_string(),
        _ => ms(result.summary.avg),
    };
    text.color(grade_color(grade)).bold()
}

pub fn loss(fraction: f64) -> ColoredString {
    let text: String = percent(fraction);
    if fraction == 0.0 {
        text.color(colors::GRADE_LOW)
    } else if fraction < 1.0 {
        text.color(colors::GRADE_MEDIUM)
    } else {
        text.color(colors::GRADE_HIGH)
    }
}

/// Pads `text` to `width` display columns.
pub fn pad(text: &str, width: usize) -> String {
    let visible: usize = console::measure_text_width(text);
    format!("{text}{}", " ".repeat(width.saturating_sub(visible)))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_units() {
        assert_eq!(ms(12.345), "12.35 ms");
        assert_eq!(percent(0.25), "25.0%");
        assert_eq!(mbps(5.24288), "5.24 Mbps");
        assert_eq!(optional_ms(None), "*");
    }

    #[test]
    fn pad_ignores_ansi_codes() {
        colored::control::set_override(true);
        let coloured = format!("{}", "abc".red());
        assert_eq!(console::measure_text_width(&pad(&coloured, 6)), 6);
        colored::control::unset_override();
    }
}
