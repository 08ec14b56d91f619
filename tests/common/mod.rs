//! In-memory stand-in for an Odoo server
//!
//! Implements `Transport` over a map of model name to records. Supports enough
//! of `search_read`, `create`, `write` and named actions to drive `CoreApi`
//! end to end, and records every call so tests can assert on wire traffic.

#![allow(dead_code)]

use async_trait::async_trait;
use odoo_core::config::{ApiConfig, CredentialsConfig, EndpointConfig};
use odoo_core::{Record, Transport, TransportError};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub model: String,
    pub method: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
pub struct MockOdoo {
    records: Mutex<HashMap<String, Vec<Record>>>,
    next_id: AtomicI64,
    calls: Mutex<Vec<RecordedCall>>,
    connects: AtomicUsize,
    refuse_connect: AtomicBool,
    active: AtomicUsize,
    max_active: AtomicUsize,
    delay: Mutex<Duration>,
    failing_models: Mutex<HashSet<String>>,
    /// action name -> (field, value) applied to the target record
    transitions: Mutex<HashMap<String, (String, Value)>>,
    /// Actions that apply their transition and still report an error
    flaky_actions: Mutex<HashSet<String>>,
}

impl MockOdoo {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// Add `count` records named `{prefix}-{n}` with sequential ids
    pub fn seed(&self, model: &str, prefix: &str, count: usize) {
        for n in 0..count {
            self.insert(model, json!({ "name": format!("{}-{}", prefix, n) }));
        }
    }

    pub fn insert(&self, model: &str, fields: Value) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut record = fields.as_object().cloned().unwrap_or_default();
        record.insert("id".to_string(), json!(id));
        self.records
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push(record);
        id
    }

    pub fn get(&self, model: &str, id: i64) -> Option<Record> {
        self.records
            .lock()
            .unwrap()
            .get(model)
            .and_then(|rs| rs.iter().find(|r| r["id"] == json!(id)).cloned())
    }

    pub fn remove_all(&self, model: &str) {
        self.records.lock().unwrap().remove(model);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn refuse_connect(&self, refuse: bool) {
        self.refuse_connect.store(refuse, Ordering::SeqCst);
    }

    pub fn fail_model(&self, model: &str) {
        self.failing_models.lock().unwrap().insert(model.to_string());
    }

    pub fn on_action(&self, action: &str, field: &str, value: Value) {
        self.transitions
            .lock()
            .unwrap()
            .insert(action.to_string(), (field.to_string(), value));
    }

    pub fn make_flaky(&self, action: &str) {
        self.flaky_actions.lock().unwrap().insert(action.to_string());
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// `(offset, limit)` of every search_read, in call order
    pub fn search_windows(&self) -> Vec<(u64, u64)> {
        self.calls_to("search_read")
            .iter()
            .map(|c| {
                (
                    c.args[2].as_u64().unwrap_or_default(),
                    c.args[3].as_u64().unwrap_or_default(),
                )
            })
            .collect()
    }

    fn search_read(&self, model: &str, args: &[Value]) -> Value {
        let domain = args.first().cloned().unwrap_or_else(|| json!([]));
        let fields: Vec<String> = args
            .get(1)
            .and_then(Value::as_array)
            .map(|fs| fs.iter().filter_map(|f| f.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let offset = args.get(2).and_then(Value::as_u64).unwrap_or(0) as usize;
        let limit = args.get(3).and_then(Value::as_u64).unwrap_or(u64::MAX) as usize;

        let records = self.records.lock().unwrap();
        let matched: Vec<Value> = records
            .get(model)
            .map(|rs| rs.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|r| matches_domain(r, &domain))
            .skip(offset)
            .take(limit)
            .map(|r| Value::Object(project(r, &fields)))
            .collect();
        Value::Array(matched)
    }

    fn apply(&self, model: &str, method: &str, args: &[Value]) -> Result<Value, TransportError> {
        if self.failing_models.lock().unwrap().contains(model) {
            return Err(TransportError::Remote {
                code: 200,
                message: format!("{} is locked", model),
                name: Some("odoo.exceptions.UserError".to_string()),
            });
        }

        match method {
            "search_read" => Ok(self.search_read(model, args)),
            "create" => Ok(json!(self.insert(model, args[0].clone()))),
            "write" => {
                let id = args[0][0].as_i64().unwrap_or_default();
                let changes = args[1].as_object().cloned().unwrap_or_default();
                let mut records = self.records.lock().unwrap();
                let record = records
                    .get_mut(model)
                    .and_then(|rs| rs.iter_mut().find(|r| r["id"] == json!(id)))
                    .ok_or_else(|| TransportError::Other(format!("no {} {}", model, id)))?;
                record.extend(changes);
                Ok(json!(true))
            }
            action => {
                let id = args[0].as_i64().unwrap_or_default();
                if let Some((field, value)) = self.transitions.lock().unwrap().get(action) {
                    let mut records = self.records.lock().unwrap();
                    if let Some(record) = records
                        .get_mut(model)
                        .and_then(|rs| rs.iter_mut().find(|r| r["id"] == json!(id)))
                    {
                        record.insert(field.clone(), value.clone());
                    }
                }
                if self.flaky_actions.lock().unwrap().contains(action) {
                    return Err(TransportError::Other("socket hang up".to_string()));
                }
                Ok(json!(true))
            }
        }
    }
}

fn matches_domain(record: &Record, domain: &Value) -> bool {
    domain.as_array().map_or(true, |terms| {
        terms.iter().all(|term| {
            let field = term[0].as_str().unwrap_or_default();
            let actual = record.get(field).unwrap_or(&Value::Null);
            match term[1].as_str().unwrap_or_default() {
                "=" => *actual == term[2],
                "!=" => *actual != term[2],
                "in" => term[2].as_array().is_some_and(|vs| vs.contains(actual)),
                _ => false,
            }
        })
    })
}

fn project(record: &Record, fields: &[String]) -> Record {
    if fields.is_empty() {
        return record.clone();
    }
    record
        .iter()
        .filter(|(k, _)| k.as_str() == "id" || fields.contains(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[async_trait]
impl Transport for MockOdoo {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(TransportError::AuthenticationRejected {
                db: "test".to_string(),
                username: "admin".to_string(),
            });
        }
        Ok(())
    }

    async fn call(
        &self,
        model: &str,
        method: &str,
        params: &[Value],
    ) -> Result<Value, TransportError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let args = params
            .first()
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            method: method.to_string(),
            args: args.clone(),
        });

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = self.apply(model, method, &args);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Complete configuration pointing nowhere in particular
pub fn test_config() -> ApiConfig {
    ApiConfig {
        endpoint: EndpointConfig {
            url: Some("odoo.test".to_string()),
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

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}
