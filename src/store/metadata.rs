//! Per-node fetch metadata

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved key under which metadata is stored on a node
pub const METADATA_KEY: &str = "_metadata";

/// Fetch bookkeeping for the data stored at exactly one node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMetadata {
    #[serde(default)]
    pub is_fetching: bool,
    #[serde(default)]
    pub has_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetch_error: Option<Value>,
    /// Unix millis of the last successful fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<i64>,
}

impl FetchMetadata {
    /// Metadata attached to a node, if any
    pub fn of(node: &Value) -> Option<Self> {
        node.get(METADATA_KEY)
            .and_then(|m| serde_json::from_value(m.clone()).ok())
    }

    pub fn received(now_ms: i64) -> Self {
        Self {
            is_fetching: false,
            has_error: false,
            last_fetch_error: None,
            fetched_at: Some(now_ms),
        }
    }

    /// Fetch in flight; keeps `fetched_at`
    pub fn requested(self) -> Self {
        Self {
            is_fetching: true,
            has_error: false,
            last_fetch_error: None,
            ..self
        }
    }

    /// Attempt failed; keeps `fetched_at`
    pub fn failed(self, error: Option<Value>) -> Self {
        Self {
            is_fetching: false,
            has_error: true,
            last_fetch_error: error,
            ..self
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Current time in Unix millis
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
