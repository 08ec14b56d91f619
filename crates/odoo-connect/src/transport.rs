//! Transport abstraction and connection parameters

use crate::error::TransportError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

/// Wire capability consumed by the upper layers
///
/// Implementations handle authentication, encoding and network I/O. They are
/// not required to tolerate overlapping calls; callers serialize access.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the authentication handshake
    async fn connect(&self) -> Result<(), TransportError>;

    /// Invoke `method` on `model`, forwarding `params` as positional arguments
    async fn call(&self, model: &str, method: &str, params: &[Value])
        -> Result<Value, TransportError>;
}

/// URL scheme used to reach the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Https => write!(f, "https"),
        }
    }
}

/// Network location of an Odoo server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(protocol: Protocol, host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
        }
    }

    /// Parse `scheme://host:port`; a missing port falls back to the scheme default
    pub fn parse(raw: &str) -> Result<Self, TransportError> {
        let url = Url::parse(raw).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        let protocol = match url.scheme() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            other => {
                return Err(TransportError::InvalidEndpoint(format!(
                    "unsupported scheme '{}'",
                    other
                )))
            }
        };
        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidEndpoint(format!("no host in '{}'", raw)))?
            .to_string();
        let port = url
            .port_or_known_default()
            .ok_or_else(|| TransportError::InvalidEndpoint(format!("no port in '{}'", raw)))?;

        Ok(Self::new(protocol, host, port))
    }

    /// Base URL of the server, e.g. `https://erp.example.com:8069/`
    pub fn base_url(&self) -> Result<Url, TransportError> {
        let raw = format!("{}://{}:{}/", self.protocol, self.host, self.port);
        Url::parse(&raw).map_err(|e| TransportError::InvalidEndpoint(format!("{}: {}", raw, e)))
    }
}

/// Login material for one database
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub db: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        db: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            db: db.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_base_url() {
        let endpoint = Endpoint::new(Protocol::Https, "erp.example.com", 8069);
        assert_eq!(
            endpoint.base_url().unwrap().as_str(),
            "https://erp.example.com:8069/"
        );
    }

    #[test]
    fn test_endpoint_parse() {
        let endpoint = Endpoint::parse("http://127.0.0.1:8069").unwrap();
        assert_eq!(endpoint, Endpoint::new(Protocol::Http, "127.0.0.1", 8069));

        let default_port = Endpoint::parse("https://erp.example.com").unwrap();
        assert_eq!(default_port.port, 443);

        assert!(matches!(
            Endpoint::parse("ftp://erp.example.com"),
            Err(TransportError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("prod", "admin", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
    }
}
