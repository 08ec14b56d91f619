/*!
 * Glue between the call queue and the Odoo transport
 */

use async_trait::async_trait;
use odoo_connect::{Transport, TransportError};
use odoo_core_dispatch::{CallQueue, Connector, Dispatcher, Session, SessionConfig};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::CallError;
use crate::query::QueryDescriptor;

/// The queue every remote call goes through
pub type OdooQueue = CallQueue<QueryDescriptor, OdooDispatcher>;

/// Session handshake performed through the transport
pub struct TransportConnector {
    transport: Arc<dyn Transport>,
}

impl TransportConnector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Connector for TransportConnector {
    type Error = TransportError;

    async fn connect(&self) -> Result<(), TransportError> {
        self.transport.connect().await
    }
}

/// Executes one descriptor: ensure a live session, then call the transport
///
/// Runs only on the queue's drain worker, so handshakes are serialized with
/// calls and never overlap one.
pub struct OdooDispatcher {
    transport: Arc<dyn Transport>,
    session: Session<TransportConnector>,
}

impl OdooDispatcher {
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let connector = Arc::new(TransportConnector::new(transport.clone()));
        Self {
            transport,
            session: Session::new(connector, config),
        }
    }

    pub fn session(&self) -> &Session<TransportConnector> {
        &self.session
    }
}

#[async_trait]
impl Dispatcher<QueryDescriptor> for OdooDispatcher {
    type Output = Value;
    type Error = CallError;

    async fn dispatch(&self, request: QueryDescriptor) -> Result<Value, CallError> {
        self.session
            .ensure_connected()
            .await
            .map_err(CallError::Connection)?;

        debug!("Calling {}", request);
        match self
            .transport
            .call(&request.model, request.method.as_str(), &request.params)
            .await
        {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.invalidates_session() {
                    warn!("Server rejected the session on {}, reconnecting on next call", request);
                    self.session.invalidate().await;
                }
                Err(CallError::Transport(e))
            }
        }
    }
}
