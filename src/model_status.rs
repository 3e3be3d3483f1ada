// Model status tracking
//
// The server exposes an append-only list of training iterations per
// category. From it we derive the version number shown to the user and
// whether a new model is currently training. The server's iteration list
// can lag the completion signal, so a bounded retry counter keeps the poll
// alive for a few extra ticks after training evidence disappears.

use serde::Deserialize;

/// Lifecycle status of one training iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IterationStatus {
    PreparingData,
    Training,
    RunningInference,
    RunningActiveLearning,
    CalculatingStatistics,
    Ready,
    Error,
}

impl IterationStatus {
    /// Statuses that mean a model is currently being produced
    pub fn in_progress(&self) -> bool {
        matches!(
            self,
            IterationStatus::PreparingData
                | IterationStatus::Training
                | IterationStatus::RunningInference
                | IterationStatus::RunningActiveLearning
                | IterationStatus::CalculatingStatistics
        )
    }
}

/// One server-side training attempt
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelIteration {
    pub iteration: u32,
    pub status: IterationStatus,
    #[serde(default)]
    pub estimated_precision: Option<f64>,
}

/// Derived model status for the current category
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ModelStatus {
    /// None until the first status fetch resolves; Some(-1) once resolved
    /// with no ready iteration; otherwise the 1-based ordinal of the most
    /// recent READY iteration
    pub version: Option<i64>,
    /// A new model is currently training (or presumed to be)
    pub next_training: bool,
    /// The newest iteration ended in ERROR
    pub last_failed: bool,
}

impl ModelStatus {
    /// Whether at least one model is ready for use
    pub fn has_model(&self) -> bool {
        matches!(self.version, Some(v) if v >= 1)
    }
}

/// Derive the displayed status from the server's iteration list.
///
/// `iterations` is server-ordered oldest first; scanning runs newest to
/// oldest. With no direct evidence of training either way, the previous
/// `next_training` value is preserved, unless the version advanced past the
/// previously known one (a newly ready model proves the training finished).
pub fn infer(iterations: &[ModelIteration], prev: &ModelStatus) -> ModelStatus {
    let latest_ready = iterations
        .iter()
        .rev()
        .find(|it| it.status == IterationStatus::Ready);
    let training = iterations.iter().any(|it| it.status.in_progress());
    let last_failed = iterations
        .last()
        .is_some_and(|it| it.status == IterationStatus::Error);

    // Versions are 1-based to the user; -1 means no model yet
    let version = match latest_ready {
        Some(it) => i64::from(it.iteration) + 1,
        None => -1,
    };

    let advanced = matches!(prev.version, Some(p) if version > p);
    let next_training = if last_failed {
        false
    } else if training {
        true
    } else if advanced {
        false
    } else {
        prev.next_training
    };

    ModelStatus {
        version: Some(version),
        next_training,
        last_failed,
    }
}

/// Bounded retry budget for the status poll.
///
/// The completion signal can arrive before the server's iteration list
/// reflects the new iteration; the counter grants a fixed number of extra
/// polls past the last training evidence before the poll goes quiet. The
/// budget is a tunable policy, not a correctness requirement.
#[derive(Debug, Clone, Copy)]
pub struct StatusRetry {
    attempts: u32,
    budget: u32,
}

impl StatusRetry {
    pub fn new(budget: u32) -> Self {
        StatusRetry {
            attempts: budget,
            budget,
        }
    }

    /// Refill the counter (a category was (re)selected)
    pub fn reset(&mut self) {
        self.attempts = self.budget;
    }

    /// Whether the next tick should poll, given current training evidence
    pub fn should_poll(&self, next_training: bool) -> bool {
        next_training || self.attempts > 0
    }

    /// Consume one attempt on a poll tick
    pub fn tick(&mut self) {
        self.attempts = self.attempts.saturating_sub(1);
    }
}
