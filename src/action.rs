/*!
 * Verified workflow actions
 *
 * The workflow RPC can report a failure even though the state change went
 * through on the server, and it can report success without the change being
 * visible. So an action is never trusted on its own return value:
 *
 * ```text
 * Fetching ─► Validating ─► Acting ─► Reverifying ─► Comparing ─► Succeeded
 *    │            │            │           │             │
 *    ▼            ▼            ▼ (captured)▼             ▼
 * NotFound   ValidationFailed  ·        NotFound   ComparisonFailed
 * ```
 *
 * The comparator sees the record before and after the action and is the only
 * authority on whether the action took effect.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, Result};
use crate::query::{id_filter, Record, ID_FIELD};

const OPERATION: &str = "actionModelByFilters";

/// Result of a caller-supplied predicate, with a human readable message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub success: bool,
    pub message: String,
}

impl Verdict {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Decides whether a fetched record may be acted on
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, record: &Record) -> Verdict;
}

/// Decides whether the action took effect
#[async_trait]
pub trait Comparator: Send + Sync {
    async fn compare(&self, original: &Record, updated: &Record, fields: &[String]) -> Verdict;
}

#[async_trait]
impl<F> Validator for F
where
    F: Fn(&Record) -> Verdict + Send + Sync,
{
    async fn validate(&self, record: &Record) -> Verdict {
        (self)(record)
    }
}

#[async_trait]
impl<F> Comparator for F
where
    F: Fn(&Record, &Record, &[String]) -> Verdict + Send + Sync,
{
    async fn compare(&self, original: &Record, updated: &Record, fields: &[String]) -> Verdict {
        (self)(original, updated, fields)
    }
}

fn show(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "<missing>".to_string(),
    }
}

/// Passes when `field` holds `expected`
#[derive(Debug, Clone)]
pub struct FieldEquals {
    field: String,
    expected: Value,
}

impl FieldEquals {
    pub fn new(field: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
        }
    }
}

#[async_trait]
impl Validator for FieldEquals {
    async fn validate(&self, record: &Record) -> Verdict {
        let actual = record.get(&self.field);
        if actual == Some(&self.expected) {
            Verdict::pass(format!("{} is {}", self.field, show(actual)))
        } else {
            Verdict::fail(format!(
                "{} is {}, expected {}",
                self.field,
                show(actual),
                show(Some(&self.expected))
            ))
        }
    }
}

/// Passes when every compared field differs between the two snapshots
///
/// With [`FieldChanged::to`] the new value must also equal the given one.
#[derive(Debug, Clone, Default)]
pub struct FieldChanged {
    target: Option<Value>,
}

impl FieldChanged {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(target: impl Into<Value>) -> Self {
        Self {
            target: Some(target.into()),
        }
    }
}

#[async_trait]
impl Comparator for FieldChanged {
    async fn compare(&self, original: &Record, updated: &Record, fields: &[String]) -> Verdict {
        let mut changes = Vec::with_capacity(fields.len());
        for field in fields {
            let before = original.get(field);
            let after = updated.get(field);
            if before == after {
                return Verdict::fail(format!("{} unchanged ({})", field, show(before)));
            }
            if let Some(target) = &self.target {
                if after != Some(target) {
                    return Verdict::fail(format!(
                        "{} changed to {}, expected {}",
                        field,
                        show(after),
                        show(Some(target))
                    ));
                }
            }
            changes.push(format!("{} {} -> {}", field, show(before), show(after)));
        }
        Verdict::pass(changes.join(", "))
    }
}

/// Everything a verified action needs; build with [`ActionRequest::builder`]
#[derive(Clone)]
pub struct ActionRequest {
    pub action: String,
    pub model: String,
    pub filters: Value,
    pub compare_fields: Vec<String>,
    pub validator: Arc<dyn Validator>,
    pub comparator: Arc<dyn Comparator>,
}

impl fmt::Debug for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRequest")
            .field("action", &self.action)
            .field("model", &self.model)
            .field("filters", &self.filters)
            .field("compare_fields", &self.compare_fields)
            .finish_non_exhaustive()
    }
}

impl ActionRequest {
    pub fn builder() -> ActionRequestBuilder {
        ActionRequestBuilder::default()
    }
}

#[derive(Default)]
pub struct ActionRequestBuilder {
    action: Option<String>,
    model: Option<String>,
    filters: Option<Value>,
    compare_fields: Option<Vec<String>>,
    validator: Option<Arc<dyn Validator>>,
    comparator: Option<Arc<dyn Comparator>>,
}

impl ActionRequestBuilder {
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn filters(mut self, filters: Value) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn compare_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compare_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Closure form of [`validator`](Self::validator)
    pub fn validate_with<F>(self, f: F) -> Self
    where
        F: Fn(&Record) -> Verdict + Send + Sync + 'static,
    {
        self.validator(f)
    }

    pub fn comparator(mut self, comparator: impl Comparator + 'static) -> Self {
        self.comparator = Some(Arc::new(comparator));
        self
    }

    /// Closure form of [`comparator`](Self::comparator)
    pub fn compare_with<F>(self, f: F) -> Self
    where
        F: Fn(&Record, &Record, &[String]) -> Verdict + Send + Sync + 'static,
    {
        self.comparator(f)
    }

    /// Fails with a configuration error naming every missing part
    ///
    /// An empty domain `[]` matches any record and is accepted; filters that
    /// are not a list count as missing.
    pub fn build(self) -> Result<ActionRequest> {
        let mut missing = Vec::new();

        let action = self.action.filter(|a| !a.trim().is_empty());
        let model = self.model.filter(|m| !m.trim().is_empty());
        let filters = self.filters.filter(Value::is_array);

        if action.is_none() {
            missing.push("action");
        }
        if model.is_none() {
            missing.push("model");
        }
        if filters.is_none() {
            missing.push("filters");
        }
        if self.compare_fields.is_none() {
            missing.push("compare fields");
        }
        if self.validator.is_none() {
            missing.push("validator");
        }
        if self.comparator.is_none() {
            missing.push("comparator");
        }

        match (
            action,
            model,
            filters,
            self.compare_fields,
            self.validator,
            self.comparator,
        ) {
            (
                Some(action),
                Some(model),
                Some(filters),
                Some(compare_fields),
                Some(validator),
                Some(comparator),
            ) if missing.is_empty() => {
                Ok(ActionRequest {
                    action,
                    model,
                    filters,
                    compare_fields,
                    validator,
                    comparator,
                })
            }
            _ => Err(ApiError::Configuration(format!(
                "incomplete parameters ({}): missing {}",
                OPERATION,
                missing.join(", ")
            ))),
        }
    }
}

/// Stage of a verified action run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStage {
    Fetching,
    Validating,
    Acting,
    Reverifying,
    Comparing,
    Succeeded,
    Failed,
}

impl fmt::Display for ActionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionStage::Fetching => "fetching",
            ActionStage::Validating => "validating",
            ActionStage::Acting => "acting",
            ActionStage::Reverifying => "reverifying",
            ActionStage::Comparing => "comparing",
            ActionStage::Succeeded => "succeeded",
            ActionStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Messages collected along a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeMessages {
    pub validation: String,
    /// Error text of the action call, empty when it reported success
    pub workflow: String,
    pub comparison: String,
}

/// A verified action that took effect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: OutcomeMessages,
    pub original: Record,
    pub updated: Record,
}

/// Record access the verifier needs
#[async_trait]
pub trait ActionBackend: Send + Sync {
    /// First record matching `filters`, reading only `fields`
    async fn find_one(&self, model: &str, filters: &Value, fields: &[String])
        -> Result<Option<Record>>;

    /// Invoke a workflow action on one record
    async fn run_action(&self, id: i64, model: &str, action: &str) -> Result<i64>;
}

/// Runs fetch, validate, act, re-fetch, compare against an [`ActionBackend`]
pub struct ActionVerifier<'b, B: ActionBackend + ?Sized> {
    backend: &'b B,
}

impl<'b, B: ActionBackend + ?Sized> ActionVerifier<'b, B> {
    pub fn new(backend: &'b B) -> Self {
        Self { backend }
    }

    pub async fn run(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let result = self.run_stages(request).await;
        match &result {
            Ok(_) => info!(
                "{} on {} verified ({})",
                request.action, request.model, ActionStage::Succeeded
            ),
            Err(e) => warn!(
                "{} on {} {}: {}",
                request.action, request.model, ActionStage::Failed, e
            ),
        }
        result
    }

    async fn run_stages(&self, request: &ActionRequest) -> Result<ActionOutcome> {
        let model = request.model.as_str();

        enter(ActionStage::Fetching, request);
        let original = self
            .backend
            .find_one(model, &request.filters, &request.compare_fields)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                operation: OPERATION,
                model: model.to_string(),
            })?;
        let id = record_id(model, &original)?;

        enter(ActionStage::Validating, request);
        let validation = request.validator.validate(&original).await;
        if !validation.success {
            return Err(ApiError::ValidationFailed(validation.message));
        }

        enter(ActionStage::Acting, request);
        let workflow = match self.backend.run_action(id, model, &request.action).await {
            Ok(_) => String::new(),
            Err(e) => {
                error!("{} on {} {} reported: {}", request.action, model, id, e);
                e.to_string()
            }
        };

        enter(ActionStage::Reverifying, request);
        let updated = self
            .backend
            .find_one(model, &id_filter(id), &request.compare_fields)
            .await?
            .ok_or_else(|| ApiError::NotFound {
                operation: OPERATION,
                model: format!("updated {}", model),
            })?;

        enter(ActionStage::Comparing, request);
        let comparison = request
            .comparator
            .compare(&original, &updated, &request.compare_fields)
            .await;
        if !comparison.success {
            return Err(ApiError::ComparisonFailed(comparison.message));
        }

        Ok(ActionOutcome {
            success: true,
            message: OutcomeMessages {
                validation: validation.message,
                workflow,
                comparison: comparison.message,
            },
            original,
            updated,
        })
    }
}

fn enter(stage: ActionStage, request: &ActionRequest) {
    debug!("{} on {}: {}", request.action, request.model, stage);
}

fn record_id(model: &str, record: &Record) -> Result<i64> {
    record
        .get(ID_FIELD)
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::UnexpectedResponse {
            operation: OPERATION,
            model: model.to_string(),
            detail: "record has no integer id".to_string(),
        })
}
