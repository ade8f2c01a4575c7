//! Per-variable outcomes of a batch run.

use serde::Serialize;

/// Result of analysing one mediator.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VariableOutcome {
    /// Analysis completed.
    Done { name: String, details: String },
    /// The model could not be fit or the data was unusable.
    Failed { name: String, error: String },
    /// The variable was not analysed.
    Skipped { name: String, reason: String },
}

impl VariableOutcome {
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Done { name, .. } | Self::Failed { name, .. } | Self::Skipped { name, .. } => {
                name
            }
        }
    }
}

/// Counts of done, failed and skipped variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub done: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn of(outcomes: &[VariableOutcome]) -> Self {
        let done = outcomes.iter().filter(|o| o.is_done()).count();
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        Self {
            done,
            failed,
            skipped: outcomes.len() - done - failed,
        }
    }
}
