use std::net::IpAddr;

use chrono::{DateTime, Local};
use serde::Serialize;

use super::sample::{Protocol, Sample, Summary};
use crate::network::target::Target;

const GRADE_MEDIUM_MS: f64 = 50.0;
const GRADE_HIGH_MS: f64 = 100.0;

/// Everything measured for one target during a round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetResult {
    pub target: Target,
    /// Address the probes were sent to. `None` when resolution failed.
    pub address: Option<IpAddr>,
    /// Probe outcomes in the order they were issued.
    pub samples: Vec<Sample>,
    #[serde(flatten)]
    pub summary: Summary,
    pub protocol: Protocol,
    /// Why the target could not be probed at all.
    pub error: Option<String>,
}

/// Coarse latency bucket used to colour results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyGrade {
    /// Below 50 ms.
    Low,
    /// 50 ms up to 100 ms.
    Medium,
    /// 100 ms and above.
    High,
    /// No probe was answered.
    Unreachable,
}

impl TargetResult {
    pub fn successful(&self) -> usize {
        self.samples.iter().filter(|s| s.is_success()).count()
    }

    pub fn grade(&self) -> LatencyGrade {
        if self.successful() == 0 {
            LatencyGrade::Unreachable
        } else if self.summary.avg < GRADE_MEDIUM_MS {
            LatencyGrade::Low
        } else if self.summary.avg < GRADE_HIGH_MS {
            LatencyGrade::Medium
        } else {
            LatencyGrade::High
        }
    }
}

/// Per-target view of the bandwidth heuristic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputReport {
    pub target: Target,
    pub estimated_bandwidth_mbps: f64,
    pub avg_latency_ms: f64,
    pub jitter_ms: f64,
}

/// One complete pass over a target set. Immutable once stored in history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRound {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub pings_per_target: u32,
    /// Results in the order the targets were given.
    pub results: Vec<TargetResult>,
}

impl MeasurementRound {
    pub fn get(&self, target: &Target) -> Option<&TargetResult> {
        self.results.iter().find(|result| &result.target == target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.results.iter().map(|result| &result.target)
    }

    /// Mean of the per-target averages, zero for an empty round.
    pub fn overall_avg(&self) -> f64 {
        mean(self.results.iter().map(|result| result.summary.avg))
    }

    /// Mean of the per-target loss fractions, zero for an empty round.
    pub fn overall_loss(&self) -> f64 {
        mean(self.results.iter().map(|result| result.summary.packet_loss))
    }

    pub fn bandwidth(&self) -> Vec<ThroughputReport> {
        self.results
            .iter()
            .map(|result| ThroughputReport {
                target: result.target.clone(),
                estimated_bandwidth_mbps: result.summary.throughput_estimate,
                avg_latency_ms: result.summary.avg,
                jitter_ms: result.summary.jitter,
            })
            .collect()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
