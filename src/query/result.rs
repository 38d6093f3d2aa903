/// Statement results
use crate::types::{Row, Value};
use serde::Serialize;
use std::time::Duration;

/// Payload of a successful statement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultData {
    /// `get` result rows
    Rows(Vec<Row>),
    /// Scalar aggregate, mutation summary or echo object
    Value(Value),
}

/// Outcome of one statement. Failures are reported here, never raised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub data: Option<ResultData>,
    pub error: Option<String>,
    pub rows_affected: usize,
    pub rows_scanned: usize,
    pub elapsed: Duration,
    /// Set by mutating statements
    pub commit_id: Option<String>,
}

impl ExecutionResult {
    pub fn ok(data: ResultData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            rows_affected: 0,
            rows_scanned: 0,
            elapsed: Duration::ZERO,
            commit_id: None,
        }
    }

    pub fn rows(rows: Vec<Row>) -> Self {
        let scanned = rows.len();
        Self::ok(ResultData::Rows(rows)).with_scanned(scanned)
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::ok(ResultData::Value(value.into()))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            rows_affected: 0,
            rows_scanned: 0,
            elapsed: Duration::ZERO,
            commit_id: None,
        }
    }

    pub fn with_affected(mut self, rows_affected: usize) -> Self {
        self.rows_affected = rows_affected;
        self
    }

    pub fn with_scanned(mut self, rows_scanned: usize) -> Self {
        self.rows_scanned = rows_scanned;
        self
    }

    pub fn with_commit(mut self, commit_id: String) -> Self {
        self.commit_id = Some(commit_id);
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Result rows of a `get`
    pub fn result_rows(&self) -> Option<&[Row]> {
        match &self.data {
            Some(ResultData::Rows(rows)) => Some(rows),
            _ => None,
        }
    }

    /// Scalar or object payload
    pub fn result_value(&self) -> Option<&Value> {
        match &self.data {
            Some(ResultData::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Field of an object payload
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.result_value()
            .and_then(Value::as_object)
            .and_then(|map| map.get(name))
    }

    /// JSON rendering of the payload; rows include their id
    pub fn data_json(&self) -> serde_json::Value {
        match &self.data {
            Some(ResultData::Rows(rows)) => {
                serde_json::Value::Array(rows.iter().map(|r| r.to_value().to_json()).collect())
            }
            Some(ResultData::Value(value)) => value.to_json(),
            None => serde_json::Value::Null,
        }
    }
}
