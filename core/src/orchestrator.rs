//! Measurement rounds.
//!
//! A round probes every target `pings_per_target` times, reduces each target's
//! samples to a [`TargetResult`] and stores the finished [`MeasurementRound`] in
//! history. Progress is pushed to an optional event channel after every probe;
//! nobody has to listen for the round to finish correctly.
//!
//! At most one round runs per orchestrator. Targets are worked on with bounded
//! parallelism, each target's probes strictly in order. With a limit of one,
//! targets are measured one after another in the order given.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use chrono::Local;
use latr_common::config::Config;
use latr_common::measurement::{MeasurementRound, Sample, TargetResult};
use latr_common::network::target::Target;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{OwnedMutexGuard, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{self, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::LatrError;
use crate::history::HistoryStore;
use crate::prober::LatencyProbe;
use crate::resolver::HostResolver;
use crate::stats;

/// Emitted after every probe (or, for a target that could not be resolved, once
/// for all of its probes).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub target: Target,
    /// 1-based index of the probe within the target's sequence.
    pub probe_index: u32,
    pub pings_per_target: u32,
    /// Probes finished so far across the whole round.
    pub completed: u64,
    pub total_probes: u64,
    /// `completed / total_probes`, never decreasing within a round.
    pub fraction_complete: f64,
    /// Outcome of the probe, `None` when the target was skipped.
    pub sample: Option<Sample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoundEvent {
    Progress(ProgressEvent),
    /// The round finished and was appended to history.
    Complete(MeasurementRound),
    /// The round broke down; `partial` holds every target that did finish.
    Failed {
        reason: String,
        partial: MeasurementRound,
    },
    /// The round was cancelled; nothing was stored.
    Cancelled,
}

/// A round running in the background.
pub struct RoundHandle {
    pub events: mpsc::UnboundedReceiver<RoundEvent>,
    pub task: JoinHandle<Result<MeasurementRound, LatrError>>,
}

/// Round bookkeeping owned by one orchestrator and shared by its clones.
#[derive(Default)]
pub struct OrchestratorState {
    history: HistoryStore,
    current: RwLock<Option<MeasurementRound>>,
    round_guard: Arc<tokio::sync::Mutex<()>>,
}

#[derive(Clone)]
pub struct MeasurementOrchestrator {
    prober: Arc<dyn LatencyProbe>,
    resolver: Arc<dyn HostResolver>,
    config: Arc<Config>,
    state: Arc<OrchestratorState>,
}

impl MeasurementOrchestrator {
    pub fn new(prober: Arc<dyn LatencyProbe>, resolver: Arc<dyn HostResolver>, config: Arc<Config>) -> Self {
        Self {
            prober,
            resolver,
            config,
            state: Arc::new(OrchestratorState::default()),
        }
    }

    /// Runs a round to completion on the calling task.
    pub async fn run_round(
        &self,
        targets: Vec<Target>,
        pings_per_target: u32,
        events: Option<mpsc::UnboundedSender<RoundEvent>>,
        cancel: CancellationToken,
    ) -> Result<MeasurementRound, LatrError> {
        validate(&targets, pings_per_target)?;
        let guard: OwnedMutexGuard<()> = self.acquire()?;
        self.execute(guard, targets, pings_per_target, events, cancel).await
    }

    /// Starts a round in the background and hands back its event stream.
    ///
    /// Parameter and concurrency checks happen before this returns, so a second
    /// call fails right away instead of through the task.
    pub fn start_round(
        &self,
        targets: Vec<Target>,
        pings_per_target: u32,
        cancel: CancellationToken,
    ) -> Result<RoundHandle, LatrError> {
        validate(&targets, pings_per_target)?;
        let guard: OwnedMutexGuard<()> = self.acquire()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let this: MeasurementOrchestrator = self.clone();
        let task = tokio::spawn(async move {
            this.execute(guard, targets, pings_per_target, Some(events_tx), cancel)
                .await
        });

        Ok(RoundHandle {
            events: events_rx,
            task,
        })
    }

    pub fn history(&self) -> &HistoryStore {
        &self.state.history
    }

    /// The last finished round, or the partial result of a failed one.
    pub fn current_round(&self) -> Option<MeasurementRound> {
        self.state.current.read().clone()
    }

    pub fn clear_current_round(&self) {
        *self.state.current.write() = None;
    }

    pub fn is_running(&self) -> bool {
        self.state.round_guard.try_lock().is_err()
    }

    fn acquire(&self) -> Result<OwnedMutexGuard<()>, LatrError> {
        self.state
            .round_guard
            .clone()
            .try_lock_owned()
            .map_err(|_| LatrError::RoundInProgress)
    }

    async fn execute(
        &self,
        _guard: OwnedMutexGuard<()>,
        targets: Vec<Target>,
        pings_per_target: u32,
        events: Option<mpsc::UnboundedSender<RoundEvent>>,
        cancel: CancellationToken,
    ) -> Result<MeasurementRound, LatrError> {
        let targets: Vec<Target> = dedup(targets);
        let config: Arc<Config> = self.config.clone();
        self.clear_current_round();

        let started_at = Local::now();
        let total_probes: u64 = targets.len() as u64 * u64::from(pings_per_target);
        let progress = Arc::new(ProgressTracker::new(total_probes, pings_per_target, events.clone()));
        let limit = Arc::new(Semaphore::new(config.parallel_targets.max(1)));
        debug!("round started: {} targets, {total_probes} probes", targets.len());

        // Dropping the set aborts every target task, so an abandoned round
        // stops probing before the round guard is released.
        let mut set: JoinSet<TargetResult> = JoinSet::new();
        let mut running: HashMap<task::Id, (usize, Target)> = HashMap::new();
        for (index, target) in targets.iter().enumerate() {
            let permit: OwnedSemaphorePermit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = limit.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let job = TargetJob {
                prober: self.prober.clone(),
                resolver: self.resolver.clone(),
                config: config.clone(),
                target: target.clone(),
                pings_per_target,
                progress: progress.clone(),
                cancel: cancel.clone(),
            };
            let handle = set.spawn(async move {
                let _permit = permit;
                job.run().await
            });
            running.insert(handle.id(), (index, target.clone()));
        }
        let started: usize = running.len();

        let mut slots: Vec<Option<TargetResult>> = (0..targets.len()).map(|_| None).collect();
        let mut failure: Option<String> = None;
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    if let Some((index, _)) = running.remove(&id) {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => {
                    let target: String = match running.remove(&e.id()) {
                        Some((_, target)) => target.to_string(),
                        None => "a target".to_string(),
                    };
                    error!("measuring {target} failed: {e}");
                    if failure.is_none() {
                        failure = Some(format!("measuring {target} failed: {e}"));
                    }
                }
            }
        }
        let results: Vec<TargetResult> = slots.into_iter().flatten().collect();

        // A round whose every probe went out stands even if the token fired late.
        let cut_short: bool = started < targets.len()
            || results
                .iter()
                .any(|r| r.samples.len() < pings_per_target as usize);
        if cut_short && cancel.is_cancelled() {
            debug!("round cancelled");
            if let Some(tx) = &events {
                let _ = tx.send(RoundEvent::Cancelled);
            }
            return Err(LatrError::Cancelled);
        }

        let round = MeasurementRound {
            started_at,
            finished_at: Local::now(),
            pings_per_target,
            results,
        };
        *self.state.current.write() = Some(round.clone());

        if let Some(reason) = failure {
            if let Some(tx) = &events {
                let _ = tx.send(RoundEvent::Failed {
                    reason: reason.clone(),
                    partial: round.clone(),
                });
            }
            return Err(LatrError::RoundFailed {
                reason,
                partial: Box::new(round),
            });
        }

        self.state.history.append(round.clone());
        if let Some(tx) = &events {
            let _ = tx.send(RoundEvent::Complete(round.clone()));
        }
        Ok(round)
    }
}

fn validate(targets: &[Target], pings_per_target: u32) -> Result<(), LatrError> {
    if targets.is_empty() {
        return Err(LatrError::InvalidParameter("no targets given".into()));
    }
    if pings_per_target == 0 {
        return Err(LatrError::InvalidParameter("pings per target must be at least 1".into()));
    }
    Ok(())
}

fn dedup(targets: Vec<Target>) -> Vec<Target> {
    let mut seen: HashSet<Target> = HashSet::new();
    targets.into_iter().filter(|t| seen.insert(t.clone())).collect()
}

/// Serializes progress updates so `completed` only ever grows on the channel.
struct ProgressTracker {
    total_probes: u64,
    pings_per_target: u32,
    completed: Mutex<u64>,
    events: Option<mpsc::UnboundedSender<RoundEvent>>,
}

impl ProgressTracker {
    fn new(total_probes: u64, pings_per_target: u32, events: Option<mpsc::UnboundedSender<RoundEvent>>) -> Self {
        Self {
            total_probes,
            pings_per_target,
            completed: Mutex::new(0),
            events,
        }
    }

    fn advance(&self, target: &Target, probe_index: u32, steps: u64, sample: Option<Sample>) {
        let mut completed = self.completed.lock();
        *completed += steps;
        let Some(tx) = &self.events else {
            return;
        };
        let _ = tx.send(RoundEvent::Progress(ProgressEvent {
            target: target.clone(),
            probe_index,
            pings_per_target: self.pings_per_target,
            completed: *completed,
            total_probes: self.total_probes,
            fraction_complete: *completed as f64 / self.total_probes as f64,
            sample,
        }));
    }
}

/// Everything one target task needs.
struct TargetJob {
    prober: Arc<dyn LatencyProbe>,
    resolver: Arc<dyn HostResolver>,
    config: Arc<Config>,
    target: Target,
    pings_per_target: u32,
    progress: Arc<ProgressTracker>,
    cancel: CancellationToken,
}

impl TargetJob {
    async fn run(self) -> TargetResult {
        let address: IpAddr = match self.resolver.resolve(&self.target).await {
            Ok(address) => address,
            Err(e) => {
                warn!("{e}");
                return self.unresolved(e.to_string());
            }
        };

        let mut samples: Vec<Sample> = Vec::with_capacity(self.pings_per_target as usize);
        for index in 1..=self.pings_per_target {
            if self.cancel.is_cancelled() {
                break;
            }
            let sample: Sample = self.prober.probe(address, self.config.probe_timeout).await;
            samples.push(sample);
            self.progress.advance(&self.target, index, 1, Some(sample));

            if index < self.pings_per_target && !self.config.probe_interval.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.config.probe_interval) => {}
                }
            }
        }

        TargetResult {
            summary: stats::summarize(&samples),
            protocol: self.prober.protocol_for(address),
            target: self.target,
            address: Some(address),
            samples,
            error: None,
        }
    }

    /// Every probe of an unresolvable target counts as lost.
    fn unresolved(self, reason: String) -> TargetResult {
        self.progress.advance(&self.target, self.pings_per_target, u64::from(self.pings_per_target), None);
        let samples: Vec<Sample> = vec![Sample::NoResponse; self.pings_per_target as usize];
        TargetResult {
            summary: stats::summarize(&samples),
            protocol: self.prober.protocol_for(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            target: self.target,
            address: None,
            samples,
            error: Some(reason),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
