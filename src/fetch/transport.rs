//! HTTP transport
//!
//! Sends a resolved [`RequestPlan`] and classifies the response into a
//! uniform `{ ok, status, data }` shape. Network and body-parse failures are
//! returned as errors; HTTP error statuses are not.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::RestConfig;
use crate::endpoint::{Method, RequestBody, RequestPlan};
use crate::error::Result;

const JSON_CONTENT_TYPE: &str = "application/json";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// Uniform transport result
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// 2xx status
    pub ok: bool,
    pub status: u16,
    /// Parsed body; for errors `{ title, message, code, ...body }`
    pub data: Option<Value>,
}

impl TransportResponse {
    pub fn ok(status: u16, data: Option<Value>) -> Self {
        Self {
            ok: true,
            status,
            data,
        }
    }

    /// Error response shaped like the HTTP transport shapes them
    pub fn error(status: u16, message: &str) -> Self {
        Self {
            ok: false,
            status,
            data: Some(error_payload(status, message, None)),
        }
    }
}

/// Sends request plans over the network
///
/// Error statuses belong in the response. Implementations that cannot
/// produce one may return `RestError::Transport` instead.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, plan: &RequestPlan) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport
pub struct ReqwestTransport {
    base_url: String,
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport from client configuration
    pub fn new(config: &RestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self::with_client(config.base_url.clone(), client))
    }

    /// Use a preconfigured `reqwest::Client`
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn full_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url.trim_end_matches('/'), url)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, plan: &RequestPlan) -> Result<TransportResponse> {
        let url = self.full_url(&plan.url);
        let mut request = self.client.request(reqwest_method(plan.method), &url);

        if !plan.query_params.is_empty() {
            request = request.query(&plan.query_params);
        }

        let content_type = plan.content_type.as_deref().unwrap_or(JSON_CONTENT_TYPE);
        let has_content_type = plan
            .headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str()));
        if !has_content_type && !content_type.starts_with(MULTIPART_CONTENT_TYPE) {
            request = request.header(header::CONTENT_TYPE, content_type);
        }
        for (name, value) in &plan.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let sends_body = !matches!(plan.method, Method::Get | Method::Head);
        if let (true, Some(body)) = (sends_body, &plan.body) {
            request = match body {
                RequestBody::Json(value) => request.body(serde_json::to_vec(value)?),
                RequestBody::Text(text) => request.body(text.clone()),
                RequestBody::Binary(bytes) => request.body(bytes.clone()),
            };
        }

        tracing::debug!(method = %plan.method, url = %url, "Sending request");
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            let echoed = plan.body.as_ref().and_then(RequestBody::as_json).cloned();
            return Ok(TransportResponse::ok(status.as_u16(), echoed));
        }

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("json"))
            .unwrap_or(false);
        let text = response.text().await?;
        let body = if !is_json {
            Value::String(text)
        } else if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                // keep the status of an error response with a broken body
                Err(_) if !status.is_success() => Value::String(text),
                Err(e) => return Err(e.into()),
            }
        };

        if status.is_success() {
            return Ok(TransportResponse::ok(status.as_u16(), Some(body)));
        }

        let reason = status.canonical_reason().unwrap_or("Unknown status");
        let parsed = is_json.then_some(body);
        Ok(TransportResponse {
            ok: false,
            status: status.as_u16(),
            data: Some(error_payload(status.as_u16(), reason, parsed)),
        })
    }
}

/// `{ title: "Error", message, code }` with JSON body fields spread on top
pub(crate) fn error_payload(status: u16, message: &str, body: Option<Value>) -> Value {
    let mut payload = json!({
        "title": "Error",
        "message": message,
        "code": status,
    });
    if let (Some(Value::Object(fields)), Value::Object(out)) = (body, &mut payload) {
        out.extend(fields);
    }
    payload
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}
