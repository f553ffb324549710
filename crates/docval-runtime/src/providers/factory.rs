//! Backend factories and the name-keyed registry.
//!
//! New backends are added by registering a factory, not by extending an
//! enum. Two registry keys may share one implementation: `github` builds
//! the OpenAI-compatible backend against a different endpoint.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = BackendRegistry::with_defaults();
//! let backend = registry.create("openai", &config)?;
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{validate_endpoint, Backend, BackendConfig, BackendError};

/// Factory for creating backends from configuration.
pub trait BackendFactory: Send + Sync {
    /// Registry key (e.g., "openai", "github").
    fn backend_type(&self) -> &'static str;

    /// Name reported by the constructed backend.
    fn implementation(&self) -> &'static str;

    /// Environment variable holding the API key.
    fn credential_env(&self) -> &'static str;

    /// Environment variable that overrides the endpoint, if any.
    fn endpoint_env(&self) -> Option<&'static str> {
        None
    }

    /// Endpoint used when none is configured.
    ///
    /// `None` means an endpoint must be configured.
    fn default_endpoint(&self) -> Option<&'static str>;

    /// Create a backend; implementations validate first.
    fn create(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError>;

    /// Validate configuration without creating a backend.
    fn validate_config(&self, config: &BackendConfig) -> Result<(), BackendError> {
        if config.api_key.as_ref().map_or(true, |k| k.is_empty()) {
            return Err(BackendError::MissingCredential {
                backend: self.backend_type().to_string(),
                env_var: self.credential_env(),
            });
        }

        if config.model_name.trim().is_empty() {
            return Err(BackendError::InvalidConfig(
                "model name must not be empty".to_string(),
            ));
        }

        match (&config.endpoint, self.default_endpoint()) {
            (Some(endpoint), _) => validate_endpoint(endpoint),
            (None, Some(_)) => Ok(()),
            (None, None) => Err(BackendError::InvalidConfig(match self.endpoint_env() {
                Some(env_var) => format!(
                    "{} backend requires an endpoint: set 'endpoint' in config or the {} environment variable",
                    self.backend_type(),
                    env_var
                ),
                None => format!("{} backend requires an endpoint", self.backend_type()),
            })),
        }
    }

    /// Resolve the endpoint to call, without a trailing slash.
    fn resolve_endpoint(&self, config: &BackendConfig) -> Result<String, BackendError> {
        config
            .endpoint
            .as_deref()
            .or(self.default_endpoint())
            .map(|e| e.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                BackendError::InvalidConfig(format!(
                    "{} backend requires an endpoint",
                    self.backend_type()
                ))
            })
    }

    fn description(&self) -> &'static str {
        "LLM backend"
    }
}

/// Summary of a registered backend, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    pub name: &'static str,
    pub implementation: &'static str,
    pub credential_env: &'static str,
    pub endpoint_env: Option<&'static str>,
    pub default_endpoint: Option<&'static str>,
    pub description: &'static str,
}

/// Registry of available backend factories, keyed by name.
#[derive(Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with `openai`, `github` and `nebulaone`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::OpenAiBackendFactory::openai()));
        registry.register(Arc::new(super::OpenAiBackendFactory::github()));
        registry.register(Arc::new(super::NebulaOneBackendFactory));
        registry
    }

    /// Register a backend factory, replacing any with the same key.
    pub fn register(&mut self, factory: Arc<dyn BackendFactory>) {
        self.factories
            .insert(factory.backend_type().to_string(), factory);
    }

    /// Look up the factory for a backend key.
    pub fn factory(&self, backend: &str) -> Result<&Arc<dyn BackendFactory>, BackendError> {
        self.factories
            .get(backend)
            .ok_or_else(|| BackendError::UnknownBackend {
                requested: backend.to_string(),
                available: self.available().iter().map(|s| s.to_string()).collect(),
            })
    }

    /// Create a backend by key.
    pub fn create(
        &self,
        backend: &str,
        config: &BackendConfig,
    ) -> Result<Arc<dyn Backend>, BackendError> {
        let factory = self.factory(backend)?;
        let created = factory.create(config)?;

        tracing::info!(
            backend,
            implementation = created.name(),
            model = created.model_name(),
            "Backend constructed"
        );

        Ok(created)
    }

    /// Validate configuration for a backend key.
    pub fn validate(&self, backend: &str, config: &BackendConfig) -> Result<(), BackendError> {
        self.factory(backend)?.validate_config(config)
    }

    /// Registered keys in sorted order.
    pub fn available(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_backend(&self, backend: &str) -> bool {
        self.factories.contains_key(backend)
    }

    pub fn describe(&self) -> Vec<BackendInfo> {
        self.factories
            .values()
            .map(|f| BackendInfo {
                name: f.backend_type(),
                implementation: f.implementation(),
                credential_env: f.credential_env(),
                endpoint_env: f.endpoint_env(),
                default_endpoint: f.default_endpoint(),
                description: f.description(),
            })
            .collect()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct MockBackend {
        model: String,
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn submit_query(&self, _prompt: &str, _text: &str) -> Result<String, BackendError> {
            Ok("mock response".to_string())
        }

        fn name(&self) -> &str {
            "mock"
        }

        fn model_name(&self) -> &str {
            &self.model
        }
    }

    struct MockBackendFactory;

    impl BackendFactory for MockBackendFactory {
        fn backend_type(&self) -> &'static str {
            "mock"
        }

        fn implementation(&self) -> &'static str {
            "mock"
        }

        fn credential_env(&self) -> &'static str {
            "MOCK_API_KEY"
        }

        fn default_endpoint(&self) -> Option<&'static str> {
            Some("http://localhost:9999")
        }

        fn create(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
            self.validate_config(config)?;
            Ok(Arc::new(MockBackend {
                model: config.model_name.clone(),
            }))
        }

        fn description(&self) -> &'static str {
            "Mock backend for testing"
        }
    }

    fn keyed() -> BackendConfig {
        BackendConfig::new("mock-model").with_api_key("test-key")
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(MockBackendFactory));

        assert!(registry.has_backend("mock"));
        assert!(!registry.has_backend("unknown"));

        let backend = registry.create("mock", &keyed()).unwrap();
        assert_eq!(backend.name(), "mock");
        assert_eq!(backend.model_name(), "mock-model");
    }

    #[test]
    fn test_registry_unknown_backend() {
        let registry = BackendRegistry::with_defaults();

        match registry.create("invalid_backend", &keyed()) {
            Err(err @ BackendError::UnknownBackend { .. }) => {
                let msg = err.to_string();
                assert!(msg.contains("Unknown backend"));
                assert!(msg.contains("invalid_backend"));
                assert!(msg.contains("github, nebulaone, openai"));
            }
            other => panic!("Expected UnknownBackend, got {:?}", other.map(|b| b.name().to_string())),
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.available(), vec!["github", "nebulaone", "openai"]);

        let info = registry.describe();
        let github = info.iter().find(|i| i.name == "github").unwrap();
        assert_eq!(github.implementation, "openai");
        assert_eq!(github.credential_env, "GITHUB_TOKEN");
    }

    #[test]
    fn test_missing_credential() {
        let registry = BackendRegistry::with_defaults();

        let err = registry
            .validate("openai", &BackendConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::MissingCredential { env_var: "OPENAI_API_KEY", .. }
        ));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_every_default_backend_builds_from_model_and_key() {
        let registry = BackendRegistry::with_defaults();

        for (key, model, implementation) in [
            ("openai", "gpt-4", "openai"),
            ("github", "gpt-4o", "openai"),
            ("nebulaone", "nebula-1", "nebulaone"),
        ] {
            let config = BackendConfig::new(model).with_api_key("test_key");
            let backend = registry.create(key, &config).unwrap();
            assert_eq!(backend.name(), implementation);
            assert_eq!(backend.model_name(), model);
        }
    }

    /// Same as the mock, but with no endpoint to fall back on.
    struct HostlessFactory;

    impl BackendFactory for HostlessFactory {
        fn backend_type(&self) -> &'static str {
            "hostless"
        }

        fn implementation(&self) -> &'static str {
            "mock"
        }

        fn credential_env(&self) -> &'static str {
            "MOCK_API_KEY"
        }

        fn endpoint_env(&self) -> Option<&'static str> {
            Some("HOSTLESS_ENDPOINT")
        }

        fn default_endpoint(&self) -> Option<&'static str> {
            None
        }

        fn create(&self, config: &BackendConfig) -> Result<Arc<dyn Backend>, BackendError> {
            MockBackendFactory.create(config)
        }
    }

    #[test]
    fn test_backend_without_default_requires_endpoint() {
        let err = HostlessFactory.validate_config(&keyed()).unwrap_err();
        assert!(matches!(err, BackendError::InvalidConfig(_)));
        assert!(err.to_string().contains("HOSTLESS_ENDPOINT"));

        let config = keyed().with_endpoint("https://hostless.example.com");
        assert!(HostlessFactory.validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_endpoint_and_model() {
        let registry = BackendRegistry::with_defaults();

        let config = keyed().with_endpoint("ftp://example.com");
        assert!(registry.validate("openai", &config).is_err());

        let config = BackendConfig::new("  ").with_api_key("k");
        assert!(registry.validate("openai", &config).is_err());
    }

    #[test]
    fn test_resolve_endpoint_trims_slash() {
        let factory = MockBackendFactory;
        let config = keyed().with_endpoint("http://example.com/v1/");
        assert_eq!(factory.resolve_endpoint(&config).unwrap(), "http://example.com/v1");
        assert_eq!(factory.resolve_endpoint(&keyed()).unwrap(), "http://localhost:9999");
    }
}
