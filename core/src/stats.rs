//! Reduction of raw samples into summary statistics.

use latr_common::measurement::{Sample, Summary};

/// Window assumed by the throughput heuristic, in bits.
const WINDOW_BITS: f64 = 65_536.0 * 8.0;

/// Summarizes one target's probe sequence.
///
/// Loss is relative to the whole sequence; every latency figure only looks at
/// successful samples and is zero when there are none. An empty sequence counts
/// as fully lost.
pub fn summarize(samples: &[Sample]) -> Summary {
    let latencies: Vec<f64> = samples.iter().filter_map(|s| s.latency_ms()).collect();
    let packet_loss: f64 = if samples.is_empty() {
        1.0
    } else {
        1.0 - latencies.len() as f64 / samples.len() as f64
    };

    if latencies.is_empty() {
        return Summary {
            packet_loss,
            ..Summary::default()
        };
    }

    let avg: f64 = latencies.iter().sum::<f64>() / latencies.len() as f64;
    let min: f64 = latencies.iter().copied().fold(f64::INFINITY, f64::min);
    let max: f64 = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Summary {
        avg,
        min,
        max,
        stdev: std_dev(&latencies, avg),
        jitter: jitter(samples),
        packet_loss,
        throughput_estimate: throughput_estimate(avg),
    }
}

/// Mean absolute delta between neighbouring samples that both succeeded.
///
/// A lost sample breaks the chain: `[100, lost, 120]` has no pair at all.
pub fn jitter(samples: &[Sample]) -> f64 {
    let deltas: Vec<f64> = samples
        .windows(2)
        .filter_map(|pair| match (pair[0], pair[1]) {
            (Sample::Success(a), Sample::Success(b)) => Some((b - a).abs()),
            _ => None,
        })
        .collect();

    if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().sum::<f64>() / deltas.len() as f64
    }
}

/// Sample standard deviation (n - 1 divisor), zero below two values.
pub fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance: f64 =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Bandwidth-delay-product guess in Mbps for a 64 KiB window.
///
/// Only an order of magnitude hint; zero when there is no latency to divide by.
pub fn throughput_estimate(avg_ms: f64) -> f64 {
    if avg_ms <= 0.0 {
        return 0.0;
    }
    WINDOW_BITS / (avg_ms / 1000.0) / 1_000_000.0
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
