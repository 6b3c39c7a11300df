//! Shared error types for the insights engine.

use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Which artifact namespace a lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Engagement-rate regression bundles.
    Regression,
    /// A/B/C tier classifier bundles.
    Tier,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Regression => write!(f, "regression"),
            ArtifactKind::Tier => write!(f, "tier"),
        }
    }
}

/// Errors surfaced by training, insight, scoring, and persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("dataset is empty")]
    EmptyDataset,

    #[error("missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("no trained {kind} model artifact found")]
    ArtifactNotFound { kind: ArtifactKind },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl EngineError {
    /// Build a missing-columns error from anything iterable over names.
    pub fn missing_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EngineError::MissingColumns {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}
