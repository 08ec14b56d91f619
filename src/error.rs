/*!
 * Error types for odoo-core
 */

use odoo_connect::TransportError;
use odoo_core_dispatch::DispatchError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

/// Failure of a single serialized call, before operation context is attached
#[derive(Debug, Error)]
pub enum CallError {
    /// The session handshake failed
    #[error("connection failed: {0}")]
    Connection(#[source] TransportError),

    /// The call itself failed
    #[error("{0}")]
    Transport(#[source] TransportError),

    /// The call queue refused or lost the call
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unusable configuration / parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Handshake with the server failed
    #[error("{operation}: connection failed: {source}")]
    Connection {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    /// An individual remote call failed
    #[error("{operation} on {model}: {source}")]
    Transport {
        operation: &'static str,
        model: String,
        #[source]
        source: TransportError,
    },

    /// A paginated read failed part way through
    #[error("getModelByFilters on {model}: {source}")]
    Fetch {
        model: String,
        #[source]
        source: Box<ApiError>,
    },

    /// Zero records where exactly one was expected
    #[error("{operation}: cannot find the {model}")]
    NotFound {
        operation: &'static str,
        model: String,
    },

    /// Caller-supplied validation rejected the record
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Caller-supplied comparison rejected the observed change
    #[error("Comparison failed: {0}")]
    ComparisonFailed(String),

    /// The server answered with something we cannot interpret
    #[error("{operation} on {model}: unexpected response: {detail}")]
    UnexpectedResponse {
        operation: &'static str,
        model: String,
        detail: String,
    },

    /// The call queue is shut down
    #[error("{operation}: call queue is closed")]
    QueueClosed { operation: &'static str },
}

/// Closed set of error kinds callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Transport,
    NotFound,
    Validation,
    Comparison,
    Protocol,
    Shutdown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Connection => write!(f, "connection"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::NotFound => write!(f, "not-found"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Comparison => write!(f, "comparison"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl ApiError {
    /// Attach operation and model context to a failed call
    pub fn from_call(operation: &'static str, model: &str, err: CallError) -> Self {
        match err {
            CallError::Connection(source) => ApiError::Connection { operation, source },
            CallError::Transport(source) => ApiError::Transport {
                operation,
                model: model.to_string(),
                source,
            },
            CallError::Dispatch(DispatchError::InvalidConfig(msg)) => ApiError::Configuration(msg),
            CallError::Dispatch(DispatchError::QueueClosed) => ApiError::QueueClosed { operation },
            CallError::Dispatch(DispatchError::Abandoned) => ApiError::QueueClosed { operation },
        }
    }

    /// Error kind, looking through fetch wrapping
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Configuration(_) => ErrorKind::Configuration,
            ApiError::Connection { .. } => ErrorKind::Connection,
            ApiError::Transport { .. } => ErrorKind::Transport,
            ApiError::Fetch { source, .. } => source.kind(),
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::ValidationFailed(_) => ErrorKind::Validation,
            ApiError::ComparisonFailed(_) => ErrorKind::Comparison,
            ApiError::UnexpectedResponse { .. } => ErrorKind::Protocol,
            ApiError::QueueClosed { .. } => ErrorKind::Shutdown,
        }
    }

    /// Check if this error is fatal (retrying the same operation cannot help)
    pub fn is_fatal(&self) -> bool {
        match self.kind() {
            ErrorKind::Configuration | ErrorKind::Shutdown | ErrorKind::Protocol => true,
            ErrorKind::Connection | ErrorKind::Transport => false,
            ErrorKind::NotFound | ErrorKind::Validation | ErrorKind::Comparison => false,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration | ErrorKind::Connection => EXIT_FATAL,
            _ => EXIT_FAILURE,
        }
    }
}
