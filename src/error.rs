//! Error types for mediation analysis.

use thiserror::Error;

/// Failures that abort the analysis of a single variable.
#[derive(Debug, Error)]
pub enum MediationError {
    /// A requested column is not in the dataset.
    #[error("column `{0}` does not exist in the dataset")]
    MissingColumn(String),

    /// Not enough complete rows to fit the model.
    #[error("{model} needs at least {needed} complete rows, got {got}")]
    InsufficientData {
        model: &'static str,
        needed: usize,
        got: usize,
    },

    /// The design or covariance matrix could not be inverted.
    #[error("singular {0} matrix (a variable has no variance or predictors are collinear)")]
    Singular(&'static str),

    /// Dataset construction with mismatched column lengths.
    #[error("column `{column}` has {got} values, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Chart rendering failed.
    #[error("plotting failed: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, MediationError>;
