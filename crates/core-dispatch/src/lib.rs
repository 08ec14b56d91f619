//! Odoo Core Dispatch: Pure-logic primitives for single-flight RPC backends
//!
//! # Overview
//!
//! Some backends fall over when they see two calls at once. This crate turns
//! such a backend into something that can be called freely from concurrent
//! code:
//!
//! - **Call Queue**: FIFO serializer with one drain worker, so exactly one
//!   request is ever in flight while every caller still gets a future back
//! - **Session**: Lazy, time-boxed connection lifecycle with coalesced handshakes
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - Wire protocols (XML-RPC, JSON-RPC, gRPC)
//! - Remote data models
//! - Application-specific concerns
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Callers (any number of tasks)         │
//! └─────────────┬───────────────────────────┘
//!               │ submit() -> PendingCall
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Call Queue                        │  ← Strict FIFO
//! │  (one pop per tick, never re-entered)   │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Dispatcher                        │  ← Your backend glue
//! │  (session.ensure_connected + call)      │
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │       Session                           │  ← Lazy, soft expiry
//! │  (Disconnected/Connecting/Connected)    │
//! └─────────────────────────────────────────┘
//! ```

pub mod call_queue;
pub mod error;
pub mod session;

// Re-export main types for convenience
pub use call_queue::{CallQueue, Dispatcher, PendingCall, QueueConfig, QueueStats};
pub use error::DispatchError;
pub use session::{Connector, Session, SessionConfig, SessionState};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use odoo_core_dispatch::prelude::*;
/// ```
pub mod prelude {
    pub use super::call_queue::{CallQueue, Dispatcher, PendingCall, QueueConfig};
    pub use super::error::DispatchError;
    pub use super::session::{Connector, Session, SessionConfig, SessionState};
}
