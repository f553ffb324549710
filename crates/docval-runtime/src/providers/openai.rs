//! OpenAI-compatible chat-completions backend.
//!
//! Serves two registry keys: `openai` against the OpenAI API and `github`
//! against the GitHub Models inference endpoint, which speaks the same
//! protocol. Both report `openai` as their implementation name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{
    build_client, check_status, factory::BackendFactory, map_send_error, secrets::ApiCredential,
    Backend, BackendConfig, BackendError, ChatMessage,
};
use crate::prompts::chat_messages;

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1";
pub const GITHUB_MODELS_ENDPOINT: &str = "https://models.inference.ai.azure.com";

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

const NAME: &str = "openai";

/// Backend for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiBackend {
    credential: ApiCredential,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiBackend {
    /// Create a backend calling `base_url`.
    pub fn new(
        credential: ApiCredential,
        base_url: impl Into<String>,
        config: &BackendConfig,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            credential,
            base_url: base_url.into(),
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout,
            client: build_client(config.timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, prompt: &str, document_text: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: chat_messages(prompt, document_text),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn first_choice_content(body: ChatCompletionResponse) -> Result<String, BackendError> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| BackendError::ParseError("response has no message content".to_string()))
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn submit_query(
        &self,
        prompt: &str,
        document_text: &str,
    ) -> Result<String, BackendError> {
        let request = self.request(prompt, document_text);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        let body: ChatCompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        first_choice_content(body)
    }

    fn name(&self) -> &str {
        NAME
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory for the OpenAI-compatible backend under a given registry key.
#[derive(Debug, Clone, Copy)]
pub struct OpenAiBackendFactory {
    key: &'static str,
    endpoint: &'static str,
    credential_env: &'static str,
    endpoint_env: Option<&'static str>,
    description: &'static str,
}

impl OpenAiBackendFactory {
    pub fn openai() -> Self {
        Self {
            key: "openai",
            endpoint: OPENAI_ENDPOINT,
            credential_env: OPENAI_API_KEY_ENV,
            endpoint_env: Some(OPENAI_BASE_URL_ENV),
            description: "OpenAI chat completions",
        }
    }

    pub fn github() -> Self {
        Self {
            key: "github",
            endpoint: GITHUB_MODELS_ENDPOINT,
            credential_env: GITHUB_TOKEN_ENV,
            endpoint_env: None,
            description: "GitHub Models (OpenAI-compatible)",
        }
    }
}

impl BackendFactory for OpenAiBackendFactory {
    fn backend_type(&self) -> &'static str {
        self.key
    }

    fn implementation(&self) -> &'static str {
        NAME
    }

    fn credential_env(&self) -> &'static str {
        self.credential_env
    }

    fn endpoint_env(&self) -> Option<&'static str> {
        self.endpoint_env
    }

    fn default_endpoint(&self) -> Option<&'static str> {
        Some(self.endpoint)
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
        self.validate_config(config)?;

        let credential = config
            .api_key
            .as_ref()
            .map(|k| ApiCredential::new(k.expose(), k.source(), self.credential_env))
            .ok_or_else(|| BackendError::MissingCredential {
                backend: self.key.to_string(),
                env_var: self.credential_env,
            })?;

        let base_url = self.resolve_endpoint(config)?;
        Ok(Arc::new(OpenAiBackend::new(credential, base_url, config)?))
    }

    fn description(&self) -> &'static str {
        self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{BackendRegistry, CredentialSource};

    fn config() -> BackendConfig {
        BackendConfig::new("gpt-4o-mini").with_api_key("sk-test")
    }

    #[test]
    fn test_request_shape() {
        let backend = OpenAiBackend::new(
            ApiCredential::new("sk-test", CredentialSource::Programmatic, "key"),
            OPENAI_ENDPOINT,
            &config(),
        )
        .unwrap();

        let value = serde_json::to_value(backend.request("Has Title?", "# Report")).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["temperature"], 0.0);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("# Report"));
    }

    #[test]
    fn test_response_content_extraction() {
        let body: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"passed\": true}"}}]
        }))
        .unwrap();
        assert_eq!(first_choice_content(body).unwrap(), "{\"passed\": true}");

        let empty: ChatCompletionResponse =
            serde_json::from_value(serde_json::json!({"choices": []})).unwrap();
        assert!(matches!(
            first_choice_content(empty),
            Err(BackendError::ParseError(_))
        ));
    }

    #[test]
    fn test_github_alias_reports_openai() {
        let registry = BackendRegistry::with_defaults();

        let github = registry.create("github", &config()).unwrap();
        assert_eq!(github.name(), "openai");

        let openai = registry.create("openai", &config()).unwrap();
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn test_endpoint_override() {
        let factory = OpenAiBackendFactory::openai();
        let config = config().with_endpoint("http://localhost:8080/v1/");
        assert_eq!(factory.resolve_endpoint(&config).unwrap(), "http://localhost:8080/v1");

        let github = OpenAiBackendFactory::github();
        assert_eq!(
            github.resolve_endpoint(&BackendConfig::default()).unwrap(),
            GITHUB_MODELS_ENDPOINT
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let backend = OpenAiBackendFactory::openai().create(&config()).unwrap();
        assert_eq!(backend.name(), "openai");

        let direct = OpenAiBackend::new(
            ApiCredential::new("sk-test", CredentialSource::Programmatic, "key"),
            OPENAI_ENDPOINT,
            &config(),
        )
        .unwrap();
        assert!(!format!("{:?}", direct).contains("sk-test"));
    }
}
