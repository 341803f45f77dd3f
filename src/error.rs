// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, FlipError>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Every failure the engine can report.
///
/// Validation errors are reported straight to the caller and never retried.
/// State errors indicate a programming mistake and abort the current
/// operation. Persistence errors carry the path involved. Cancellation is
/// not an error; see [`crate::runner::RunStatus`].
#[derive(Debug, Error)]
pub enum FlipError {
    // --- Input validation ---
    #[error("invalid count for {what}: {value} (must be at least {min})")]
    InvalidCount { what: &'static str, value: i64, min: i64 },

    #[error("percentile {value} is out of range [0, 100]")]
    InvalidPercentile { value: f64 },

    #[error("unknown selection strategy '{0}' (expected 'random' or 'sequential')")]
    UnknownSelectionStrategy(String),

    #[error("invalid config value for '{key}': {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("failed to parse config: {source}")]
    ConfigSyntax {
        #[from]
        source: serde_yml::Error,
    },

    #[error("cannot take {requested} members from a group of {available}")]
    InsufficientMembers { requested: usize, available: usize },

    #[error("population is empty")]
    EmptyPopulation,

    // --- State ---
    #[error("exchange {index} has already been settled")]
    DoubleSettlement { index: u64 },

    #[error("population of {size} is not a sub-population and has no parent")]
    NoParent { size: usize },

    #[error("history capture at exchange {got} does not follow previous capture at {last}")]
    NonMonotonicHistory { last: u64, got: u64 },

    #[error("exchange {index} of {amount} would overflow a participant's wealth")]
    WealthOverflow { index: u64, amount: i64 },

    #[error("exchange {index} changed the pair's combined wealth by {error}")]
    TransferImbalance { index: u64, error: i64 },

    #[error("wealth is not conserved: expected total {expected}, found {actual}")]
    ConservationViolated { expected: i64, actual: i64 },

    #[error("a background run is already active for {path}")]
    RunnerBusy { path: PathBuf },

    #[error("background worker stopped without reporting an outcome")]
    WorkerLost,

    // --- Persistence ---
    #[error("state file {path} was corrupt and has been deleted: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("no saved state at {path}")]
    NotFound { path: PathBuf },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode state for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl FlipError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Whether this error came from bad caller input rather than state or I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCount { .. }
                | Self::InvalidPercentile { .. }
                | Self::UnknownSelectionStrategy(_)
                | Self::InvalidConfig { .. }
                | Self::ConfigSyntax { .. }
                | Self::InsufficientMembers { .. }
                | Self::EmptyPopulation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_path() {
        let err = FlipError::CorruptState {
            path: PathBuf::from("/tmp/session/current.json"),
            reason: "expected value at line 1 column 1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/session/current.json"));
        assert!(msg.contains("deleted"));
    }

    #[test]
    fn test_validation_classification() {
        assert!(FlipError::UnknownSelectionStrategy("round".into()).is_validation());
        assert!(FlipError::InvalidPercentile { value: 101.0 }.is_validation());
        assert!(!FlipError::DoubleSettlement { index: 3 }.is_validation());
        assert!(!FlipError::NotFound { path: PathBuf::from("x") }.is_validation());
    }
}
