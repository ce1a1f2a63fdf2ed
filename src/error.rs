//! Error types and handling for RSequence
//!
//! Exhausting the source is never an error: terminal operations surface it
//! as an empty or absent result. The variants here cover protocol misuse and
//! the runtime plumbing needed to drive the production loop.

/// Main error type for sequence operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    /// A terminal operation was started while another one was still running
    /// on the same sequence
    #[error("ConcurrencyViolation: sequence '{label}' already has a running terminal operation")]
    ConcurrencyViolation { label: String },
    /// An operation that needs a predicate was invoked on an unbounded view
    #[error("{operation} must be used with a predicate")]
    MissingPredicate { operation: &'static str },
    /// No tokio runtime was available to schedule a production step
    #[error("no tokio runtime available to drive the sequence")]
    NoRuntime,
    /// The completion of an async operation was dropped before it fired
    #[error("operation abandoned before completion")]
    Abandoned,
}

impl SequenceError {
    /// True for the error that signals two overlapping terminal operations
    pub fn is_concurrency_violation(&self) -> bool {
        matches!(self, SequenceError::ConcurrencyViolation { .. })
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for SequenceError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        SequenceError::Abandoned
    }
}

impl From<tokio::runtime::TryCurrentError> for SequenceError {
    fn from(_: tokio::runtime::TryCurrentError) -> Self {
        SequenceError::NoRuntime
    }
}

/// Result type for sequence operations
pub type SequenceResult<T> = Result<T, SequenceError>;
