//! Query execution against a document store.

use crate::pipeline::StructuredQuery;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sewana_core::{AppError, AppResult};
use std::sync::Arc;

/// One result document.
pub type Record = Map<String, Value>;

/// A store able to run aggregation pipelines.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Run `query` verbatim against `collection`.
    async fn aggregate(&self, collection: &str, query: &StructuredQuery) -> AppResult<Vec<Record>>;
}

/// Runs structured queries against one collection.
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Execute a query. An empty result is not an error.
    ///
    /// Every store failure surfaces as [`AppError::Execution`]; nothing is
    /// retried here.
    pub async fn execute(&self, query: &StructuredQuery) -> AppResult<Vec<Record>> {
        tracing::debug!(
            store = self.store.name(),
            collection = %self.collection,
            stages = query.len(),
            "Executing structured query"
        );

        let records = self
            .store
            .aggregate(&self.collection, query)
            .await
            .map_err(|e| match e {
                err @ AppError::Execution(_) => err,
                other => AppError::Execution(other.to_string()),
            })?;

        tracing::debug!(records = records.len(), "Structured query finished");
        Ok(records)
    }
}

/// Flatten a record into `field: value` lines.
///
/// Nested objects use dotted names, arrays of scalars are comma-joined and
/// arrays of documents are indexed (`availability.0.day`).
pub fn record_to_text(record: &Record) -> String {
    let mut lines = Vec::new();
    for (key, value) in record {
        flatten_into(key, value, &mut lines);
    }
    lines.join("\n")
}

fn flatten_into(path: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&format!("{}.{}", path, key), nested, lines);
            }
        }
        Value::Array(items) if items.iter().all(is_scalar) => {
            let joined = items.iter().map(scalar_text).collect::<Vec<_>>().join(", ");
            lines.push(format!("{}: {}", path, joined));
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                flatten_into(&format!("{}.{}", path, index), item, lines);
            }
        }
        scalar => lines.push(format!("{}: {}", path, scalar_text(scalar))),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
