//! Error types for the odoo-connect crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Authentication rejected for user {username} on database {db}")]
    AuthenticationRejected { db: String, username: String },

    #[error("Not authenticated, call connect() first")]
    NotAuthenticated,

    #[error("Remote error {code}: {message}")]
    Remote {
        code: i64,
        message: String,
        /// Server-side exception name, e.g. `odoo.exceptions.UserError`
        name: Option<String>,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether the error comes from the remote application rather than the wire
    pub fn is_remote(&self) -> bool {
        matches!(self, TransportError::Remote { .. })
    }

    /// Whether the session should be re-established before the next call
    pub fn invalidates_session(&self) -> bool {
        match self {
            TransportError::NotAuthenticated => true,
            TransportError::Remote { name, .. } => name.as_deref().is_some_and(|n| {
                n.ends_with("SessionExpiredException") || n.ends_with("AccessDenied")
            }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = TransportError::Remote {
            code: 200,
            message: "Odoo Server Error".to_string(),
            name: Some("odoo.exceptions.UserError".to_string()),
        };
        assert_eq!(err.to_string(), "Remote error 200: Odoo Server Error");
        assert!(err.is_remote());
        assert!(!err.invalidates_session());
    }

    #[test]
    fn test_session_invalidation() {
        assert!(TransportError::NotAuthenticated.invalidates_session());
        assert!(TransportError::Remote {
            code: 100,
            message: "Odoo Session Expired".to_string(),
            name: Some("odoo.http.SessionExpiredException".to_string()),
        }
        .invalidates_session());
        assert!(!TransportError::Other("boom".to_string()).invalidates_session());
    }
}
