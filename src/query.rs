/*!
 * Request builders for the Odoo external API
 *
 * Every builder is a pure function producing a [`QueryDescriptor`]: the model,
 * the method, and the positional argument list handed to `execute_kw`. No I/O
 * happens here and nothing is validated; callers pass well-formed input.
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A remote record: field name to value
pub type Record = Map<String, Value>;

/// Name of the identity field on every record
pub const ID_FIELD: &str = "id";

/// Remote method a descriptor invokes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    SearchRead,
    Create,
    Write,
    /// Named workflow action, e.g. `action_confirm`
    Action(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::SearchRead => "search_read",
            Method::Create => "create",
            Method::Write => "write",
            Method::Action(name) => name,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully specified shape of one remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub model: String,
    pub method: Method,
    pub params: Vec<Value>,
}

impl QueryDescriptor {
    fn new(model: &str, method: Method, args: Vec<Value>) -> Self {
        Self {
            model: model.to_string(),
            method,
            params: vec![Value::Array(args)],
        }
    }

    /// The positional argument array
    pub fn args(&self) -> &[Value] {
        match self.params.first() {
            Some(Value::Array(args)) => args,
            _ => &[],
        }
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.model, self.method)
    }
}

/// Filtered read: `[filters, fields, offset, limit, order?]`
///
/// `order` is appended only when given, so its absence changes the arity.
pub fn build_search(
    model: &str,
    fields: &[String],
    filters: &Value,
    offset: usize,
    limit: usize,
    order: Option<&str>,
) -> QueryDescriptor {
    let mut args = vec![
        filters.clone(),
        Value::from(fields.to_vec()),
        Value::from(offset),
        Value::from(limit),
    ];
    if let Some(order) = order {
        args.push(Value::from(order));
    }
    QueryDescriptor::new(model, Method::SearchRead, args)
}

/// Record creation: `[record]`
pub fn build_create(model: &str, record: &Record) -> QueryDescriptor {
    QueryDescriptor::new(model, Method::Create, vec![Value::Object(record.clone())])
}

/// Update by identity: `[[id], record]`
pub fn build_update(model: &str, id: i64, record: &Record) -> QueryDescriptor {
    let mut payload = record.clone();
    payload.remove(ID_FIELD);
    QueryDescriptor::new(
        model,
        Method::Write,
        vec![Value::from(vec![id]), Value::Object(payload)],
    )
}

/// Workflow action on one record: `[id, ...additional]`
pub fn build_action(model: &str, id: i64, action: &str, additional: &[Value]) -> QueryDescriptor {
    let mut args = Vec::with_capacity(additional.len() + 1);
    args.push(Value::from(id));
    args.extend_from_slice(additional);
    QueryDescriptor::new(model, Method::Action(action.to_string()), args)
}

/// Domain matching exactly one record by identity
pub fn id_filter(id: i64) -> Value {
    serde_json::json!([[ID_FIELD, "=", id]])
}
