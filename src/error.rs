use std::path::PathBuf;

use thiserror::Error;

/// Error type used by operations in this crate.
///
/// A bisection that produces an empty half is not an error: it is reported
/// through [`crate::bisecting::BisectStatus::SplitFailure`] on the returned
/// partition.
#[derive(Debug, Error)]
pub enum BkmeansError {
    /// The dataset path does not exist.
    #[error("dataset file {} does not exist", path.display())]
    MissingFile { path: PathBuf },

    /// The dataset file produced no numeric row at all.
    #[error("no numeric data found in {}", path.display())]
    EmptyDataset { path: PathBuf },

    /// A numeric row does not have the width of the first numeric row.
    #[error("line {line}: expected {expected} numeric values, found {found}")]
    RaggedRows {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// More initial centroids requested than points available.
    #[error("cannot draw {requested} distinct centroids from {available} points")]
    Initialization { requested: usize, available: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenient alias for results produced by this crate.
pub type Result<T> = std::result::Result<T, BkmeansError>;
