//! Error taxonomy for the variation pipeline.

use thiserror::Error;

/// Errors surfaced by the pipeline stages.
///
/// Every variant that is not [`PipelineError::InvalidRecord`] aborts the run.
/// Invalid records are collected by the aggregator and reported alongside its
/// output instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("no trip records for {period}")]
    EmptyInput { period: String },

    #[error("invalid trip record #{index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("failed to fetch {resource}: {reason}")]
    SourceFetch { resource: String, reason: String },

    #[error("series misaligned: {0}")]
    Alignment(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// Wraps any I/O, HTTP or parse failure as a fatal fetch error for `resource`.
    pub fn fetch(resource: impl Into<String>, err: &anyhow::Error) -> Self {
        PipelineError::SourceFetch {
            resource: resource.into(),
            reason: format!("{err:#}"),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
