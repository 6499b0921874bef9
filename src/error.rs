//! Error types for capture analysis.

use thiserror::Error;

/// Errors surfaced by the analysis library.
///
/// A missing pre or post capture is not an error (devices are diffed against
/// empty text), and undecodable bytes in capture files are dropped silently.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The caller supplied something unusable (missing directory, empty query).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A session, device, or command lookup came up empty.
    #[error("not found: {0}")]
    NotFound(String),

    /// A configuration value could not be used (e.g. a bad regex pattern).
    #[error("configuration error: {0}")]
    Config(String),

    /// Underlying filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
