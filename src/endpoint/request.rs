//! Request descriptors issued by the application

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::RestError;

/// HTTP method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = RestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            other => Err(RestError::Validation(format!("unsupported method: {}", other))),
        }
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Structured body, serialized as JSON and merged with endpoint defaults
    Json(Value),
    /// Form-encoded string, sent verbatim
    Text(String),
    /// Binary form data, sent verbatim
    Binary(Vec<u8>),
}

impl RequestBody {
    /// String values are form bodies, everything else is JSON
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => RequestBody::Text(s),
            other => RequestBody::Json(other),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, RequestBody::Json(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RequestBody::Json(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

/// A single "fetch requested" command
///
/// # Example
///
/// ```rust
/// use elohim_rest::{Method, RequestDescriptor};
/// use serde_json::json;
///
/// let request = RequestDescriptor::new("users.posts")
///     .with_method(Method::Post)
///     .with_path_param(42)
///     .with_body(json!({ "title": "Hello" }))
///     .with_guid("tmp-1");
/// assert_eq!(request.path_params, vec![Some("42".to_string())]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    /// Dotted model path locating both endpoint and store position
    pub model_name: String,
    pub method: Option<Method>,
    pub headers: BTreeMap<String, String>,
    pub query_params: BTreeMap<String, String>,
    /// Ordered id values; `None` marks a missing value
    pub path_params: Vec<Option<String>>,
    pub body: Option<RequestBody>,
    pub content_type: Option<String>,
    /// Deliver the result to a hook instead of the store
    pub no_store: bool,
    /// Single attempt only
    pub no_retry: bool,
    /// Correlation id for optimistic creates and hooks
    pub guid: Option<String>,
    /// Interval for recurring tasks
    pub period: Option<Duration>,
    /// Identifier a recurring task is cancelled by
    pub task_id: Option<String>,
}

impl RequestDescriptor {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    pub fn with_path_param(mut self, value: impl ToString) -> Self {
        self.path_params.push(Some(value.to_string()));
        self
    }

    pub fn with_missing_path_param(mut self) -> Self {
        self.path_params.push(None);
        self
    }

    pub fn with_path_params<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.path_params
            .extend(values.into_iter().map(|v| Some(v.to_string())));
        self
    }

    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn no_store(mut self) -> Self {
        self.no_store = true;
        self
    }

    pub fn no_retry(mut self) -> Self {
        self.no_retry = true;
        self
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = Some(guid.into());
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("TRACE".parse::<Method>().is_err());
        assert_eq!(Method::default(), Method::Get);

        let parsed: Method = serde_json::from_value(json!("PATCH")).unwrap();
        assert_eq!(parsed, Method::Patch);
    }

    #[test]
    fn test_body_from_value() {
        assert_eq!(
            RequestBody::from_value(json!("a=1&b=2")),
            RequestBody::Text("a=1&b=2".into())
        );
        assert!(RequestBody::from_value(json!({ "a": 1 })).is_json());
    }

    #[test]
    fn test_builder_collects_params() {
        let request = RequestDescriptor::new("users.posts")
            .with_path_params([1, 2])
            .with_missing_path_param()
            .no_retry()
            .with_task_id("poll");

        assert_eq!(
            request.path_params,
            vec![Some("1".into()), Some("2".into()), None]
        );
        assert!(request.no_retry);
        assert!(!request.no_store);
        assert_eq!(request.task_id.as_deref(), Some("poll"));
    }
}
