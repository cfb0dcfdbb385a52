//! Error types for the REST data layer

use thiserror::Error;

/// Result type for REST data layer operations
pub type Result<T> = std::result::Result<T, RestError>;

/// REST data layer error
#[derive(Debug, Error)]
pub enum RestError {
    /// Request descriptor is missing required fields or names an unknown model
    #[error("Validation error: {0}")]
    Validation(String),

    /// URL still contains unresolved placeholders
    #[error("Invalid URL for {model_name}: {url}")]
    InvalidUrl { model_name: String, url: String },

    /// Server returned a non-ok status
    #[error("Server error {status}: {message}")]
    Transport { status: u16, message: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RestError {
    /// Whether this error represents an HTTP 401
    pub fn is_unauthorized(&self) -> bool {
        match self {
            RestError::Transport { status, .. } => *status == 401,
            RestError::Http(e) => e.status().map(|s| s.as_u16()) == Some(401),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for RestError {
    fn from(e: toml::de::Error) -> Self {
        RestError::Config(e.to_string())
    }
}

impl From<serde_yaml::Error> for RestError {
    fn from(e: serde_yaml::Error) -> Self {
        RestError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_detection() {
        let err = RestError::Transport {
            status: 401,
            message: "Unauthorized".into(),
        };
        assert!(err.is_unauthorized());

        let err = RestError::Transport {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert!(!err.is_unauthorized());
        assert!(!RestError::Validation("missing modelName".into()).is_unauthorized());
    }
}
