use serde::Deserialize;
use serde::Serialize;

/// Progress of a single automation run.
///
/// A run moves strictly forward through
/// `Idle -> Loading -> Invoking -> Persisting -> Done`, and can drop into
/// `Failed` from any step before `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Loading,
    Invoking,
    Persisting,
    Done,
    Failed,
}

impl RunPhase {
    pub fn label(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Loading => "loading",
            RunPhase::Invoking => "invoking",
            RunPhase::Persisting => "persisting",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }

    pub fn next(self) -> Option<RunPhase> {
        match self {
            RunPhase::Idle => Some(RunPhase::Loading),
            RunPhase::Loading => Some(RunPhase::Invoking),
            RunPhase::Invoking => Some(RunPhase::Persisting),
            RunPhase::Persisting => Some(RunPhase::Done),
            RunPhase::Done | RunPhase::Failed => None,
        }
    }

    pub fn can_transition_to(self, target: RunPhase) -> bool {
        if target == RunPhase::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(target)
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
