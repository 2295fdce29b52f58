//! Import Progress Reporting
//!
//! Long imports run as background jobs; callers observe their lifecycle
//! through a `ProgressReporter`. The engine pushes a `Start` state before
//! validation, `DataPrepared` once the write set is staged, and `Success`
//! or `Failure` after the apply phase. Validation-blocked batches stop at
//! `DataPrepared`.

use std::sync::Mutex;

/// Lifecycle states of one import batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportState {
    /// Validation has begun
    Start,
    /// The write set is staged; apply is next unless problems were recorded
    DataPrepared,
    /// The transaction committed
    Success {
        created: usize,
        updated: usize,
        unchanged: usize,
        deleted: usize,
    },
    /// The transaction failed and was rolled back
    Failure { error: String },
}

/// Observer for import lifecycle states.
///
/// Implementations must be cheap and non-blocking; the engine calls
/// `update` inline.
pub trait ProgressReporter: Send + Sync {
    fn update(&self, state: ImportState);
}

/// Reporter that discards all states, for callers that do not track
/// progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn update(&self, _state: ImportState) {}
}

/// Reporter that records every state it receives, for tests and polling
/// callers.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    states: Mutex<Vec<ImportState>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The states received so far, in order.
    pub fn states(&self) -> Vec<ImportState> {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn update(&self, state: ImportState) {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(state);
    }
}
