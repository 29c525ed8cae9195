use std::time::Duration;

use super::{AppError, PlatformClass, TaskFailure};

/// How long a finished run's message stays on screen.
pub const FINISHED_LINGER: Duration = Duration::from_secs(5);
/// How long a run that never started transfers stays on screen.
pub const ABORTED_LINGER: Duration = Duration::from_secs(3);

/// One discovered image and the name it will be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTask {
    pub index: usize,
    pub source: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Done { index: usize },
    Failed { index: usize, failure: TaskFailure },
}

/// Aggregate counters for one run.
///
/// `processed + failed` never exceeds `total` and reaches it exactly when the
/// last task resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    pub processed: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            processed: 0,
            failed: 0,
            total,
        }
    }

    pub fn record(&mut self, outcome: &TaskOutcome) {
        debug_assert!(!self.is_complete(), "more outcomes than tasks");
        match outcome {
            TaskOutcome::Done { .. } => self.processed += 1,
            TaskOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn resolved(&self) -> usize {
        self.processed + self.failed
    }

    pub fn is_complete(&self) -> bool {
        self.resolved() == self.total
    }

    pub fn summary(&self) -> String {
        let mut line = format!("Saved {}/{}", self.processed, self.total);
        if self.failed > 0 {
            line.push_str(&format!(", {} failed", self.failed));
        }
        line
    }

    pub fn outcome(&self) -> RunOutcome {
        if self.total == 0 {
            RunOutcome::NoImages
        } else if self.failed == 0 {
            RunOutcome::Succeeded { total: self.total }
        } else {
            RunOutcome::Failed {
                processed: self.processed,
                failed: self.failed,
                total: self.total,
            }
        }
    }
}

/// Final state of a run, rendered once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NoImages,
    PageUnavailable(AppError),
    Succeeded {
        total: usize,
    },
    Failed {
        processed: usize,
        failed: usize,
        total: usize,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    pub fn message(&self) -> String {
        match self {
            RunOutcome::NoImages => "No images found on this page".to_string(),
            RunOutcome::PageUnavailable(e) => e.to_string(),
            RunOutcome::Succeeded { total } => format!("Saved all {} images", total),
            RunOutcome::Failed {
                processed,
                failed,
                total,
            } => format!(
                "Saved {} of {} images, {} failed",
                processed, total, failed
            ),
        }
    }

    pub fn linger(&self) -> Duration {
        match self {
            RunOutcome::NoImages | RunOutcome::PageUnavailable(_) => ABORTED_LINGER,
            _ => FINISHED_LINGER,
        }
    }
}

/// Events a run emits, in order: one `Started`, any number of `Progress`,
/// one `Finished`. Runs that find nothing go straight to `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Started {
        total: usize,
        prefix: String,
        platform: PlatformClass,
    },
    Progress(ProgressState),
    Finished(RunOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Neutral,
    Success,
    Error,
}

/// The on-screen status banner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusIndicator {
    #[default]
    Absent,
    Active(ProgressState),
    Terminal(RunOutcome),
}

impl StatusIndicator {
    pub fn start(&mut self, total: usize) {
        *self = StatusIndicator::Active(ProgressState::new(total));
    }

    /// Counters only ever grow, so the latest snapshot wins.
    pub fn update(&mut self, progress: ProgressState) {
        if let StatusIndicator::Active(current) = self {
            *current = progress;
        }
    }

    /// Switch to the terminal message and return how long it should stay.
    pub fn finish(&mut self, outcome: RunOutcome) -> Duration {
        let linger = outcome.linger();
        *self = StatusIndicator::Terminal(outcome);
        linger
    }

    pub fn dismiss(&mut self) {
        *self = StatusIndicator::Absent;
    }

    pub fn text(&self) -> Option<String> {
        match self {
            StatusIndicator::Absent => None,
            StatusIndicator::Active(progress) => Some(progress.summary()),
            StatusIndicator::Terminal(outcome) => Some(outcome.message()),
        }
    }

    pub fn tone(&self) -> Option<StatusTone> {
        match self {
            StatusIndicator::Absent => None,
            StatusIndicator::Active(_) => Some(StatusTone::Neutral),
            StatusIndicator::Terminal(outcome) if outcome.is_success() => Some(StatusTone::Success),
            StatusIndicator::Terminal(_) => Some(StatusTone::Error),
        }
    }
}
