/*!
 * odoo-core - Serialized record access for the Odoo external API
 *
 * Turns a backend that cannot take two calls at once into an API that can be
 * used freely from concurrent code:
 * - Strict FIFO call serialization with a single call in flight
 * - Lazy sessions with soft expiry
 * - Paginated reads bounded by a per-call record cap
 * - Workflow actions verified by re-reading the record
 *
 * Version: 0.3.0
 * Author: Shane Wall <shaneawall@gmail.com>
 */

pub mod action;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod output;
pub mod query;

// Re-export commonly used types
pub use action::{
    ActionBackend, ActionOutcome, ActionRequest, ActionStage, ActionVerifier, Comparator,
    FieldChanged, FieldEquals, OutcomeMessages, Validator, Verdict,
};
pub use api::CoreApi;
pub use config::{ApiConfig, LogLevel};
pub use error::{ApiError, ErrorKind, Result};
pub use fetch::{FetchPlan, FetchWindow};
pub use query::{Method, QueryDescriptor, Record};

pub use odoo_connect::{Transport, TransportError};
pub use odoo_core_dispatch::QueueStats;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
