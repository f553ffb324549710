//! Backend abstractions for docval-runtime.
//!
//! This module defines the trait every model provider implements and
//! includes an OpenAI-compatible chat-completion backend (also serving the
//! `github` alias) and a NebulaOne backend.
//!
//! ## Security
//!
//! All backends hold their API key in an [`ApiCredential`], which never
//! appears in `Debug` or `Display` output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
mod nebulaone;
mod openai;
pub mod secrets;

pub use factory::{BackendFactory, BackendInfo, BackendRegistry};
pub use nebulaone::{
    NebulaOneBackend, NebulaOneBackendFactory, NEBULAONE_API_KEY_ENV, NEBULAONE_ENDPOINT,
    NEBULAONE_ENDPOINT_ENV,
};
pub use openai::{
    OpenAiBackend, OpenAiBackendFactory, GITHUB_MODELS_ENDPOINT, GITHUB_TOKEN_ENV,
    OPENAI_API_KEY_ENV, OPENAI_BASE_URL_ENV, OPENAI_ENDPOINT,
};
pub use secrets::{ApiCredential, CredentialSource, EnvAdapter};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Errors from backends.
///
/// The first three variants are configuration errors raised while
/// constructing a backend; the rest happen while querying one.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Unknown backend '{requested}'. Available backends: {}", .available.join(", "))]
    UnknownBackend {
        requested: String,
        available: Vec<String>,
    },

    #[error("{backend} backend requires an API key: set 'api_key' in config or the {env_var} environment variable")]
    MissingCredential {
        backend: String,
        env_var: &'static str,
    },

    #[error("Invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::HttpError(_)
            | BackendError::RateLimited { .. }
            | BackendError::Timeout(_) => true,
            BackendError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether this error was raised while constructing a backend.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BackendError::UnknownBackend { .. }
                | BackendError::MissingCredential { .. }
                | BackendError::InvalidConfig(_)
        )
    }
}

/// Configuration for constructing a backend.
///
/// Nothing here is read from the environment; see [`EnvAdapter`] for
/// filling missing values from environment variables at the program
/// boundary.
#[derive(Debug)]
pub struct BackendConfig {
    /// Model to use (e.g., "gpt-4o-mini")
    pub model_name: String,

    /// API key; construction fails without one
    pub api_key: Option<ApiCredential>,

    /// Endpoint override (uses the backend default when absent)
    pub endpoint: Option<String>,

    /// Temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// HTTP request timeout
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL.to_string(),
            api_key: None,
            endpoint: None,
            temperature: 0.0,
            max_tokens: 1000,
            timeout: Duration::from_secs(60),
        }
    }
}

impl BackendConfig {
    /// Create a new config with the specified model.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    /// Set an API key supplied by the caller.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(ApiCredential::new(
            api_key,
            CredentialSource::Programmatic,
            "API key",
        ));
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// A chat message for completion requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role: "system", "user", or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A model provider that judges a rule against document text.
///
/// Backends are stateless with respect to documents and can be shared
/// across validation runs.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask the model to judge `prompt` against `document_text`.
    ///
    /// Returns the model's raw answer; normalization happens elsewhere.
    async fn submit_query(&self, prompt: &str, document_text: &str)
        -> Result<String, BackendError>;

    /// Implementation name (the `github` alias reports "openai").
    fn name(&self) -> &str;

    /// Model queried by this backend.
    fn model_name(&self) -> &str;

    /// Base URL queried, when the backend talks to a remote host.
    fn endpoint(&self) -> Option<&str> {
        None
    }
}

/// Check that an endpoint is an http(s) URL.
pub(crate) fn validate_endpoint(url: &str) -> Result<(), BackendError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(BackendError::InvalidConfig(format!(
            "endpoint must start with http:// or https://, got '{}'",
            url
        )))
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::InvalidConfig(format!("failed to build HTTP client: {}", e)))
}

pub(crate) fn map_send_error(error: reqwest::Error, timeout: Duration) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout(timeout)
    } else {
        BackendError::HttpError(error.to_string())
    }
}

/// Map non-success statuses to errors, passing successful responses through.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(BackendError::AuthError);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(BackendError::RateLimited { retry_after });
    }

    let message = response.text().await.unwrap_or_default();
    Err(BackendError::ApiError {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_creation() {
        let system = ChatMessage::system("You are a validator.");
        assert_eq!(system.role, "system");

        let user = ChatMessage::user("Hello!");
        assert_eq!(user.role, "user");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(BackendError::HttpError("reset".into()).is_retryable());
        assert!(BackendError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(BackendError::RateLimited { retry_after: None }.is_retryable());
        assert!(BackendError::ApiError { status: 503, message: String::new() }.is_retryable());
        assert!(!BackendError::ApiError { status: 400, message: String::new() }.is_retryable());
        assert!(!BackendError::AuthError.is_retryable());
        assert!(!BackendError::InvalidConfig("x".into()).is_retryable());
    }

    #[test]
    fn test_configuration_classification() {
        let unknown = BackendError::UnknownBackend {
            requested: "invalid_backend".into(),
            available: vec!["openai".into()],
        };
        assert!(unknown.is_configuration());
        assert!(!BackendError::AuthError.is_configuration());
    }

    #[test]
    fn test_config_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.temperature, 0.0);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_validate_endpoint() {
        assert!(validate_endpoint("https://api.example.com/v1").is_ok());
        assert!(validate_endpoint("http://localhost:8080").is_ok());
        assert!(validate_endpoint("api.example.com").is_err());
    }
}
