//! JsonRpcTransport: Odoo external API over `/jsonrpc`

use crate::error::TransportError;
use crate::transport::{Credentials, Endpoint, Transport};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<RpcErrorData>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Transport speaking Odoo's JSON-RPC endpoint
///
/// `connect()` authenticates through the `common` service and stores the
/// returned user id; `call()` goes through `object.execute_kw`.
///
/// # Example
///
/// ```rust,no_run
/// use odoo_connect::{Credentials, Endpoint, JsonRpcTransport, Protocol, Transport};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), odoo_connect::TransportError> {
/// let transport = JsonRpcTransport::new(
///     Endpoint::new(Protocol::Https, "erp.example.com", 443),
///     Credentials::new("prod", "admin", "secret"),
/// )?;
///
/// transport.connect().await?;
/// let partners = transport
///     .call("res.partner", "search_read", &[json!([[], ["name"], 0, 5])])
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct JsonRpcTransport {
    client: reqwest::Client,
    url: Url,
    credentials: Credentials,
    /// User id returned by the last successful authentication
    uid: RwLock<Option<i64>>,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Create a transport with the default timeout
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Result<Self, TransportError> {
        Self::with_timeout(endpoint, credentials, DEFAULT_TIMEOUT)
    }

    /// Create a transport with a custom per-request timeout
    pub fn with_timeout(
        endpoint: Endpoint,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let url = endpoint
            .base_url()?
            .join("jsonrpc")
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            credentials,
            uid: RwLock::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    /// URL requests are posted to
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// User id from the last successful handshake
    pub async fn uid(&self) -> Option<i64> {
        *self.uid.read().await
    }

    async fn rpc(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = envelope(id, service, method, args);

        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: RpcResponse = response.json().await?;
        settle(payload)
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let creds = &self.credentials;
        debug!("Authenticating {} on database {}", creds.username, creds.db);

        let result = self
            .rpc(
                "common",
                "authenticate",
                vec![
                    json!(creds.db),
                    json!(creds.username),
                    json!(creds.password),
                    json!({}),
                ],
            )
            .await?;

        // Odoo answers `false` for bad credentials instead of an error
        let uid = result
            .as_i64()
            .ok_or_else(|| TransportError::AuthenticationRejected {
                db: creds.db.clone(),
                username: creds.username.clone(),
            })?;

        *self.uid.write().await = Some(uid);
        info!("Authenticated {} (uid {})", creds.username, uid);
        Ok(())
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        params: &[Value],
    ) -> Result<Value, TransportError> {
        let uid = self.uid().await.ok_or(TransportError::NotAuthenticated)?;
        let creds = &self.credentials;

        let mut args = Vec::with_capacity(5 + params.len());
        args.push(json!(creds.db));
        args.push(json!(uid));
        args.push(json!(creds.password));
        args.push(json!(model));
        args.push(json!(method));
        args.extend(params.iter().cloned());

        debug!("execute_kw {}.{}", model, method);
        self.rpc("object", "execute_kw", args).await
    }
}

fn envelope(id: u64, service: &str, method: &str, args: Vec<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "call",
        "params": {
            "service": service,
            "method": method,
            "args": args,
        },
        "id": id,
    })
}

fn settle(payload: RpcResponse) -> Result<Value, TransportError> {
    if let Some(err) = payload.error {
        let (name, detail) = match err.data {
            Some(data) => (data.name, data.message),
            None => (None, None),
        };
        let message = match detail {
            Some(detail) if !detail.is_empty() => format!("{}: {}", err.message, detail),
            _ => err.message,
        };
        return Err(TransportError::Remote {
            code: err.code,
            message,
            name,
        });
    }

    payload.result.ok_or_else(|| {
        TransportError::InvalidResponse("response has neither result nor error".to_string())
    })
}
