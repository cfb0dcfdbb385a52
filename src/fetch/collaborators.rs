//! Injected collaborators: token access, error reporting, live state

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OAuth access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Expiry as Unix millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl OAuthToken {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some("Bearer".to_string()),
            expires_at: None,
        }
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Supplies an access token before each attempt
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self, model_name: &str) -> Option<OAuthToken>;
}

/// Fixed token, useful for service credentials
pub struct StaticToken(pub OAuthToken);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self, _model_name: &str) -> Option<OAuthToken> {
        Some(self.0.clone())
    }
}

/// Receives a message for every failed attempt except HTTP 401
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Live application state used to fill `{{name}}` placeholders
#[async_trait]
pub trait StateSource: Send + Sync {
    async fn state_snapshot(&self) -> Value;
}
