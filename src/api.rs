/*!
 * Public record-access API
 *
 * `CoreApi` owns the call queue and the session. Every public operation builds
 * one or more descriptors, submits them to the queue and awaits the result, so
 * callers can use it freely from concurrent tasks while the server only ever
 * sees one call at a time.
 */

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use odoo_connect::{JsonRpcTransport, Transport};
use odoo_core_dispatch::{CallQueue, QueueStats};
use serde_json::Value;
use std::fmt::{self, Write};
use std::sync::Arc;
use tracing::{info, warn};

use crate::action::{ActionBackend, ActionOutcome, ActionRequest, ActionVerifier};
use crate::config::ApiConfig;
use crate::dispatch::{OdooDispatcher, OdooQueue};
use crate::error::{ApiError, CallError, Result};
use crate::fetch::{FetchRequest, PaginatedFetcher};
use crate::query::{build_action, build_create, build_update, QueryDescriptor, Record, ID_FIELD};

/// Many2many "link" command understood by Odoo writes
const LINK_COMMAND: i64 = 4;

pub struct CoreApi {
    name: String,
    queue: OdooQueue,
    dispatcher: Arc<OdooDispatcher>,
    max_records_per_call: usize,
    date_format: String,
}

impl fmt::Debug for CoreApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreApi")
            .field("name", &self.name)
            .field("max_records_per_call", &self.max_records_per_call)
            .field("stats", &self.queue.stats())
            .finish_non_exhaustive()
    }
}

impl CoreApi {
    /// Validate the configuration and start the call queue over `transport`
    ///
    /// Must be called from within a tokio runtime. No network traffic happens
    /// until the first operation.
    pub fn initialize(config: &ApiConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let dispatcher = Arc::new(OdooDispatcher::new(transport, config.session_config()));
        let queue = CallQueue::start(dispatcher.clone(), config.queue_config())
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        info!(
            "{} initialized (max {} records per call)",
            config.name, config.dispatch.max_records_per_call
        );

        Ok(Self {
            name: config.name.clone(),
            queue,
            dispatcher,
            max_records_per_call: config.dispatch.max_records_per_call,
            date_format: config.date_format.clone(),
        })
    }

    /// Initialize over the JSON-RPC transport described by `config`
    pub fn connect(config: &ApiConfig) -> Result<Self> {
        let transport = JsonRpcTransport::with_timeout(
            config.endpoint()?,
            config.credentials()?,
            config.request_timeout(),
        )
        .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Self::initialize(config, Arc::new(transport))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, operation: &'static str, descriptor: QueryDescriptor) -> Result<Value> {
        let model = descriptor.model.clone();
        self.queue
            .submit(descriptor)
            .await
            .map_err(|e: CallError| ApiError::from_call(operation, &model, e))
    }

    /// Create a record and return its new id
    pub async fn insert_model(&self, model: &str, record: &Record) -> Result<i64> {
        const OP: &str = "insertModel";

        let result = self.call(OP, build_create(model, record)).await;
        let value = result.inspect_err(|_| warn!("Failed to insert model {}", model))?;

        let id = value.as_i64().ok_or_else(|| ApiError::UnexpectedResponse {
            operation: OP,
            model: model.to_string(),
            detail: format!("expected the new id, got {}", value),
        })?;
        info!("insertModel: inserted {} {}", model, id);
        Ok(id)
    }

    /// Write every field of `record` except `id` onto the record with that id
    pub async fn update_model(&self, model: &str, record: &Record) -> Result<i64> {
        const OP: &str = "updateModel";

        let id = record
            .get(ID_FIELD)
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                ApiError::Configuration(format!("{}: record for {} has no integer id", OP, model))
            })?;

        self.call(OP, build_update(model, id, record))
            .await
            .inspect_err(|_| warn!("Failed to update model {}", model))?;

        info!("updateModel: updated {} {}", model, id);
        Ok(id)
    }

    /// Invoke a workflow action (e.g. `action_confirm`) on one record
    pub async fn execute_workflow(
        &self,
        id: i64,
        model: &str,
        action: &str,
        additional: &[Value],
    ) -> Result<i64> {
        const OP: &str = "executeWorkflow";

        self.call(OP, build_action(model, id, action, additional))
            .await
            .inspect_err(|_| warn!("Failed to execute workflow on model {}", model))?;

        info!("executeWorkflow: executed {} on {} {}", action, model, id);
        Ok(id)
    }

    /// Filtered read, split into capped sub-calls
    pub async fn get_model_by_filters(
        &self,
        model: &str,
        filters: &Value,
        fields: &[String],
        offset: usize,
        limit: usize,
        sorting: Option<&str>,
    ) -> Result<Vec<Record>> {
        let request = FetchRequest {
            model,
            filters,
            fields,
            offset,
            limit,
            sorting,
        };
        PaginatedFetcher::new(&self.queue, self.max_records_per_call)
            .fetch(&request)
            .await
            .inspect_err(|_| warn!("Failed to getModelByFilters {}", model))
    }

    /// Fetch one record, validate, act, re-fetch and compare
    pub async fn action_model_by_filters(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        info!(
            "actionModelByFilters: {} {} matching {}",
            request.action, request.model, request.filters
        );
        ActionVerifier::new(self).run(request).await
    }

    /// Configured chrono format string
    pub fn date_format(&self) -> &str {
        &self.date_format
    }

    /// Render a timestamp with the configured date format
    pub fn format_timestamp<Tz>(&self, timestamp: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut out = String::new();
        if write!(out, "{}", timestamp.format(&self.date_format)).is_err() {
            out = timestamp.to_rfc3339();
        }
        out
    }

    /// Value for a many2many field that links `ids`, or `false` when empty
    pub fn format_many2one(ids: &[i64]) -> Value {
        if ids.is_empty() {
            Value::Bool(false)
        } else {
            Value::Array(vec![Value::from(LINK_COMMAND), Value::from(ids.to_vec())])
        }
    }

    /// Queue activity counters
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Handshakes performed so far
    pub fn handshakes(&self) -> u64 {
        self.dispatcher.session().handshakes()
    }

    pub async fn is_connected(&self) -> bool {
        self.dispatcher.session().is_connected().await
    }

    /// Stop the drain worker; later operations fail with `QueueClosed`
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
        info!("{} shut down", self.name);
    }
}

#[async_trait]
impl ActionBackend for CoreApi {
    async fn find_one(
        &self,
        model: &str,
        filters: &Value,
        fields: &[String],
    ) -> Result<Option<Record>> {
        let mut records = self
            .get_model_by_filters(model, filters, fields, 0, 1, None)
            .await?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }

    async fn run_action(&self, id: i64, model: &str, action: &str) -> Result<i64> {
        self.execute_workflow(id, model, action, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CredentialsConfig, EndpointConfig};
    use chrono::NaiveDate;
    use odoo_connect::TransportError;
    use serde_json::json;

    struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn connect(&self) -> std::result::Result<(), TransportError> {
            Err(TransportError::Other("offline".to_string()))
        }

        async fn call(
            &self,
            _model: &str,
            _method: &str,
            _params: &[Value],
        ) -> std::result::Result<Value, TransportError> {
            Err(TransportError::NotAuthenticated)
        }
    }

    fn config() -> ApiConfig {
        ApiConfig {
            endpoint: EndpointConfig {
                url: Some("localhost".to_string()),
                port: Some(8069),
                ..Default::default()
            },
            credentials: CredentialsConfig {
                db: Some("test".to_string()),
                username: Some("admin".to_string()),
                password: Some("admin".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_format_many2one() {
        assert_eq!(CoreApi::format_many2one(&[]), json!(false));
        assert_eq!(CoreApi::format_many2one(&[3, 9]), json!([4, [3, 9]]));
    }

    #[tokio::test]
    async fn test_format_timestamp_uses_configured_format() {
        let api = CoreApi::initialize(&config(), Arc::new(Offline)).unwrap();
        let timestamp = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(7, 5, 30))
            .unwrap()
            .and_utc();

        assert_eq!(api.date_format(), "%Y%m%d %H:%M:%S");
        assert_eq!(api.format_timestamp(&timestamp), "20240309 07:05:30");
        api.shutdown().await;
    }

    #[tokio::test]
    async fn test_initialize_rejects_incomplete_config() {
        let mut incomplete = config();
        incomplete.credentials.db = None;

        let err = CoreApi::initialize(&incomplete, Arc::new(Offline)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_update_without_id_is_configuration_error() {
        let api = CoreApi::initialize(&config(), Arc::new(Offline)).unwrap();
        let record = json!({"name": "ACME"}).as_object().cloned().unwrap();

        let err = api.update_model("res.partner", &record).await.unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
        assert_eq!(api.stats().executed + api.stats().failed, 0);
        api.shutdown().await;
    }
}
