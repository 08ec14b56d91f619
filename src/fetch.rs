/*!
 * Paginated reads bounded by a per-call record cap
 *
 * A read of `limit` records starting at `offset` is split into
 * `ceil(limit / cap)` contiguous windows. Each window is one serialized
 * `search_read`; results are concatenated in window order. A window that
 * comes back short means the server has no more matches, so the remaining
 * windows are skipped.
 */

use serde_json::Value;
use tracing::debug;

use crate::dispatch::OdooQueue;
use crate::error::{ApiError, Result};
use crate::query::{build_search, Record};

const OPERATION: &str = "search_read";

/// One sub-call of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub index: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Split of a requested range into capped windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    offset: usize,
    limit: usize,
    cap: usize,
}

impl FetchPlan {
    /// A zero cap is treated as 1
    pub fn new(offset: usize, limit: usize, cap: usize) -> Self {
        Self {
            offset,
            limit,
            cap: cap.max(1),
        }
    }

    /// Number of sub-calls needed
    pub fn call_count(&self) -> usize {
        self.limit.div_ceil(self.cap)
    }

    /// Windows in call order; the last one carries the remainder
    pub fn windows(&self) -> impl Iterator<Item = FetchWindow> + '_ {
        (0..self.call_count()).map(move |index| {
            let consumed = self.cap * index;
            FetchWindow {
                index,
                offset: self.offset.saturating_add(consumed),
                limit: self.cap.min(self.limit - consumed),
            }
        })
    }
}

/// Filtered read parameters
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub model: &'a str,
    pub filters: &'a Value,
    pub fields: &'a [String],
    pub offset: usize,
    pub limit: usize,
    pub sorting: Option<&'a str>,
}

/// Issues the windows of a [`FetchPlan`] through the call queue
pub struct PaginatedFetcher<'q> {
    queue: &'q OdooQueue,
    cap: usize,
}

impl<'q> PaginatedFetcher<'q> {
    pub fn new(queue: &'q OdooQueue, cap: usize) -> Self {
        Self { queue, cap }
    }

    /// Read `request.limit` records, stopping early once the server runs dry
    ///
    /// Any failed window aborts the whole read with an error naming the model.
    /// A range whose end does not fit in `usize` is rejected before any call.
    pub async fn fetch(&self, request: &FetchRequest<'_>) -> Result<Vec<Record>> {
        if request.offset.checked_add(request.limit).is_none() {
            return Err(ApiError::Configuration(format!(
                "{}: offset {} plus limit {} is out of range",
                request.model, request.offset, request.limit
            )));
        }

        self.fetch_windows(request)
            .await
            .map_err(|source| ApiError::Fetch {
                model: request.model.to_string(),
                source: Box::new(source),
            })
    }

    async fn fetch_windows(&self, request: &FetchRequest<'_>) -> Result<Vec<Record>> {
        let plan = FetchPlan::new(request.offset, request.limit, self.cap);
        let total = plan.call_count();
        let mut records = Vec::with_capacity(request.limit.min(self.cap));

        for window in plan.windows() {
            debug!(
                "Fetching {} window {}/{} (offset {}, limit {})",
                request.model,
                window.index + 1,
                total,
                window.offset,
                window.limit
            );

            let descriptor = build_search(
                request.model,
                request.fields,
                request.filters,
                window.offset,
                window.limit,
                request.sorting,
            );
            let value = self
                .queue
                .submit(descriptor)
                .await
                .map_err(|e| ApiError::from_call(OPERATION, request.model, e))?;

            let page = into_records(request.model, value)?;
            let short = page.len() < window.limit;
            records.extend(page);

            if short {
                debug!(
                    "{} exhausted after window {}, {} records",
                    request.model,
                    window.index + 1,
                    records.len()
                );
                break;
            }
        }

        Ok(records)
    }
}

/// Decode a `search_read` result
pub(crate) fn into_records(model: &str, value: Value) -> Result<Vec<Record>> {
    let unexpected = |detail: String| ApiError::UnexpectedResponse {
        operation: OPERATION,
        model: model.to_string(),
        detail,
    };

    let Value::Array(items) = value else {
        return Err(unexpected(format!("expected a list of records, got {}", value)));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(unexpected(format!("expected a record, got {}", other))),
        })
        .collect()
}
