//! Error types for matcheval.

use thiserror::Error;

/// Result type for matcheval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for matcheval operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A correspondence was rejected at the collection boundary
    /// (missing source or target URI). The collection is left unchanged.
    #[error("Invalid correspondence: {0}")]
    InvalidCorrespondence(String),

    /// Two execution results cannot be compared because they do not share
    /// the same reference alignment (or test case).
    #[error("Uncomparable results: {0}")]
    UncomparableResults(String),

    /// Invalid input provided (bad alpha, bad rounding precision, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Evaluation error.
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

impl Error {
    /// Create an invalid correspondence error.
    pub fn invalid_correspondence(msg: impl Into<String>) -> Self {
        Error::InvalidCorrespondence(msg.into())
    }

    /// Create an uncomparable results error.
    pub fn uncomparable(msg: impl Into<String>) -> Self {
        Error::UncomparableResults(msg.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Error::Evaluation(msg.into())
    }
}
