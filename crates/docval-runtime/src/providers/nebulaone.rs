//! NebulaOne backend.
//!
//! NebulaOne exposes a single `POST {endpoint}/chat` route authenticated
//! with an `x-api-key` header. The hosted endpoint is used unless the
//! config or `NEBULAONE_ENDPOINT` points elsewhere.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{
    build_client, check_status, factory::BackendFactory, map_send_error, secrets::ApiCredential,
    Backend, BackendConfig, BackendError,
};
use crate::prompts::{user_message, SYSTEM_PROMPT};

pub const NEBULAONE_ENDPOINT: &str = "https://api.nebulaone.ai/v1";

pub const NEBULAONE_API_KEY_ENV: &str = "NEBULAONE_API_KEY";
pub const NEBULAONE_ENDPOINT_ENV: &str = "NEBULAONE_ENDPOINT";

const NAME: &str = "nebulaone";

pub struct NebulaOneBackend {
    credential: ApiCredential,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for NebulaOneBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NebulaOneBackend")
            .field("credential", &self.credential)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish()
    }
}

impl NebulaOneBackend {
    pub fn new(
        credential: ApiCredential,
        endpoint: impl Into<String>,
        config: &BackendConfig,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            credential,
            endpoint: endpoint.into(),
            model: config.model_name.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout,
            client: build_client(config.timeout)?,
        })
    }

    fn request<'a>(&'a self, prompt: &str, document_text: &str) -> NebulaRequest<'a> {
        NebulaRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            prompt: user_message(prompt, document_text),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct NebulaRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
}

/// The answer field differs between NebulaOne deployments.
#[derive(Debug, Default, Deserialize)]
struct NebulaResponse {
    response: Option<String>,
    output: Option<String>,
    #[serde(default)]
    choices: Vec<NebulaChoice>,
}

#[derive(Debug, Deserialize)]
struct NebulaChoice {
    message: NebulaMessage,
}

#[derive(Debug, Deserialize)]
struct NebulaMessage {
    content: Option<String>,
}

impl NebulaResponse {
    fn into_answer(self) -> Result<String, BackendError> {
        self.response
            .or(self.output)
            .or_else(|| {
                self.choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
            })
            .ok_or_else(|| {
                BackendError::ParseError(
                    "response has none of 'response', 'output' or 'choices'".to_string(),
                )
            })
    }
}

#[async_trait]
impl Backend for NebulaOneBackend {
    async fn submit_query(
        &self,
        prompt: &str,
        document_text: &str,
    ) -> Result<String, BackendError> {
        let request = self.request(prompt, document_text);

        let response = self
            .client
            .post(format!("{}/chat", self.endpoint))
            .header("x-api-key", self.credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;

        let body: NebulaResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        body.into_answer()
    }

    fn name(&self) -> &str {
        NAME
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Option<&str> {
        Some(&self.endpoint)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NebulaOneBackendFactory;

impl BackendFactory for NebulaOneBackendFactory {
    fn backend_type(&self) -> &'static str {
        NAME
    }

    fn implementation(&self) -> &'static str {
        NAME
    }

    fn credential_env(&self) -> &'static str {
        NEBULAONE_API_KEY_ENV
    }

    fn endpoint_env(&self) -> Option<&'static str> {
        Some(NEBULAONE_ENDPOINT_ENV)
    }

    fn default_endpoint(&self) -> Option<&'static str> {
        Some(NEBULAONE_ENDPOINT)
    }

    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
        self.validate_config(config)?;

        let credential = config
            .api_key
            .as_ref()
            .map(|k| ApiCredential::new(k.expose(), k.source(), NEBULAONE_API_KEY_ENV))
            .ok_or_else(|| BackendError::MissingCredential {
                backend: NAME.to_string(),
                env_var: NEBULAONE_API_KEY_ENV,
            })?;

        let endpoint = self.resolve_endpoint(config)?;
        Ok(Arc::new(NebulaOneBackend::new(credential, endpoint, config)?))
    }

    fn description(&self) -> &'static str {
        "NebulaOne chat API"
    }
}
