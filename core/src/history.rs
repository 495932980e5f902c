use latr_common::measurement::MeasurementRound;
use parking_lot::RwLock;

/// Append-only log of completed rounds, oldest first.
///
/// Only the orchestrator appends. Readers get a snapshot and never see a round
/// change after it was stored.
#[derive(Debug, Default)]
pub struct HistoryStore {
    rounds: RwLock<Vec<MeasurementRound>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&self, round: MeasurementRound) {
        self.rounds.write().push(round);
    }

    pub fn snapshot(&self) -> Vec<MeasurementRound> {
        self.rounds.read().clone()
    }

    pub fn clear(&self) {
        self.rounds.write().clear();
    }

    pub fn len(&self) -> usize {
        self.rounds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.read().is_empty()
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
