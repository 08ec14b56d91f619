//! Error types for the dispatch primitives

use thiserror::Error;

/// Errors raised by the dispatch layer itself, independent of what the
/// underlying dispatcher reports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The drain worker has stopped; the call was never executed
    #[error("Call queue is closed, request was not executed")]
    QueueClosed,

    /// The worker dropped the reply channel without settling the call
    #[error("Pending call was dropped before it settled")]
    Abandoned,

    /// A queue or session setting is unusable
    #[error("Invalid dispatch configuration: {0}")]
    InvalidConfig(String),
}
