//! Session lifecycle with lazy establishment and soft expiry
//!
//! A session moves between three states:
//! - Disconnected: no usable session, the next call must handshake
//! - Connecting: a handshake is in progress, other callers wait on it
//! - Connected: the handshake succeeded and the session is fresh until its deadline
//!
//! The deadline is a single value reset on every successful handshake. Once it
//! passes, the session reports itself as Disconnected and the next
//! [`Session::ensure_connected`] performs exactly one new handshake.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::DispatchError;

/// Observable state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No live session
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Session is live until `expires_at`
    Connected { expires_at: Instant },
}

/// Configuration for session lifetime
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a session is trusted after a successful handshake
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    /// Create a configuration with the given time-to-live
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Reject a zero TTL, which would force a handshake before every call
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.ttl.is_zero() {
            return Err(DispatchError::InvalidConfig(
                "session ttl must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Performs the handshake that establishes a session
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Error reported by a failed handshake
    type Error: Send;

    /// Establish (or re-establish) the remote session
    async fn connect(&self) -> Result<(), Self::Error>;
}

/// Lazily established, time-boxed session
///
/// # Example
/// ```no_run
/// use odoo_core_dispatch::{Connector, Session, SessionConfig};
/// use std::sync::Arc;
///
/// struct Handshake;
///
/// #[async_trait::async_trait]
/// impl Connector for Handshake {
///     type Error = std::io::Error;
///
///     async fn connect(&self) -> Result<(), Self::Error> {
///         Ok(())
///     }
/// }
///
/// # async fn example() -> Result<(), std::io::Error> {
/// let session = Session::new(Arc::new(Handshake), SessionConfig::default());
///
/// // First call handshakes, calls within the TTL are no-ops
/// session.ensure_connected().await?;
/// session.ensure_connected().await?;
/// assert_eq!(session.handshakes(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Session<C: Connector> {
    config: Arc<SessionConfig>,
    connector: Arc<C>,
    state: Arc<Mutex<SessionState>>,
    /// Held for the duration of a handshake so concurrent callers coalesce
    handshake_gate: Mutex<()>,
    handshakes: AtomicU64,
}

impl<C: Connector> Session<C> {
    /// Create a new, disconnected session
    pub fn new(connector: Arc<C>, config: SessionConfig) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            state: Arc::new(Mutex::new(SessionState::Disconnected)),
            handshake_gate: Mutex::new(()),
            handshakes: AtomicU64::new(0),
        }
    }

    /// Create a session with the default 60 second TTL
    pub fn new_default(connector: Arc<C>) -> Self {
        Self::new(connector, SessionConfig::default())
    }

    /// Current state, with an elapsed deadline reported as Disconnected
    pub async fn state(&self) -> SessionState {
        let mut state = self.state.lock().await;
        Self::expire_if_due(&mut state);
        *state
    }

    /// Whether the session is live right now
    pub async fn is_connected(&self) -> bool {
        matches!(self.state().await, SessionState::Connected { .. })
    }

    /// Number of handshakes attempted so far
    pub fn handshakes(&self) -> u64 {
        self.handshakes.load(Ordering::Relaxed)
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    /// Make sure a live session exists, handshaking if needed
    ///
    /// A handshake failure leaves the session disconnected and is returned to
    /// this caller only. There is no automatic retry: the next call tries again.
    pub async fn ensure_connected(&self) -> Result<(), C::Error> {
        if self.is_connected().await {
            return Ok(());
        }

        let _gate = self.handshake_gate.lock().await;

        // Another caller may have finished a handshake while we waited
        if self.is_connected().await {
            debug!("Session established by a concurrent handshake");
            return Ok(());
        }

        *self.state.lock().await = SessionState::Connecting;
        self.handshakes.fetch_add(1, Ordering::Relaxed);
        debug!("Starting session handshake");

        match self.connector.connect().await {
            Ok(()) => {
                let expires_at = Instant::now() + self.config.ttl;
                *self.state.lock().await = SessionState::Connected { expires_at };
                info!(
                    "Session established, valid for {}s",
                    self.config.ttl.as_secs()
                );
                Ok(())
            }
            Err(e) => {
                *self.state.lock().await = SessionState::Disconnected;
                warn!("Session handshake failed");
                Err(e)
            }
        }
    }

    /// Drop the current session so the next call handshakes again
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        if !matches!(*state, SessionState::Disconnected) {
            debug!("Session invalidated");
        }
        *state = SessionState::Disconnected;
    }

    fn expire_if_due(state: &mut SessionState) {
        if let SessionState::Connected { expires_at } = *state {
            if Instant::now() >= expires_at {
                debug!("Session expired, will reconnect on next call");
                *state = SessionState::Disconnected;
            }
        }
    }
}
