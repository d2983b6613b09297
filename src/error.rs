//! Operation-level failures returned by the engine and the flows built on it.
//!
//! Per-cell problems (an unparseable timestamp, a non-numeric value) are never
//! errors: they become missing values in the derived column.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("start and end column are both '{0}'; choose two different columns")]
    InvalidColumnPair(String),

    #[error("column '{0}' not found")]
    ColumnNotFound(String),

    #[error("percentile must be in (0, 100], got {0}")]
    InvalidPercentile(f64),

    #[error("bucket width must be at least 0.1, got {0}")]
    InvalidBucketWidth(f64),

    #[error("bucket width {width} would need {count} buckets for this column, more than {max}")]
    TooManyBuckets { width: f64, count: f64, max: usize },

    #[error("invalid pivot: {0}")]
    InvalidPivot(String),

    #[error("no input: {0}")]
    EmptyInput(String),

    #[error("no variant names could be extracted from {lines} line(s)")]
    NoVariantsExtracted { lines: usize },

    #[error("invalid listing pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
