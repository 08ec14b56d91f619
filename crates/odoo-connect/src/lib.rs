//! Odoo Connect: Client-side transport for the Odoo external API
//!
//! This crate provides the wire layer underneath `odoo-core`. It knows how to
//! authenticate and how to invoke a model method; it does not know about
//! queuing, pagination or verification.
//!
//! # Architecture
//!
//! - **Transport**: The narrow capability (`connect` + `call`) the upper layers consume
//! - **JsonRpcTransport**: `Transport` over Odoo's `/jsonrpc` endpoint via reqwest
//!
//! # Example
//!
//! ```rust,no_run
//! use odoo_connect::{Credentials, Endpoint, JsonRpcTransport, Transport};
//!
//! async fn example() -> Result<(), odoo_connect::TransportError> {
//!     let endpoint = Endpoint::parse("https://erp.example.com:8069")?;
//!     let credentials = Credentials::new("prod", "admin", "secret");
//!     let transport = JsonRpcTransport::new(endpoint, credentials)?;
//!
//!     transport.connect().await?;
//!     let id = transport
//!         .call("res.partner", "create", &[serde_json::json!([{"name": "ACME"}])])
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod jsonrpc;
pub mod transport;

pub use error::TransportError;
pub use jsonrpc::JsonRpcTransport;
pub use transport::{Credentials, Endpoint, Protocol, Transport};
