//! Config file loading and setting precedence.
//!
//! Flags win over the config file, the config file over the environment,
//! and the environment over built-in defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use docval_runtime::{
    ApiCredential, BackendConfig, BackendError, BackendRegistry, CredentialSource, EnvAdapter,
    RuntimeConfig, DEFAULT_MODEL,
};

pub const DEFAULT_BACKEND: &str = "openai";

/// Contents of a `--config` file.
///
/// ```yaml
/// backend: nebulaone
/// model: nebula-large
/// endpoint: https://nebula.example.com/api
/// runtime:
///   concurrency: 8
///   query_timeout: 90s
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub runtime: RuntimeConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Values given on the command line.
#[derive(Debug, Default)]
pub struct Overrides {
    pub backend: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub concurrency: Option<usize>,
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    pub no_cache: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug)]
pub struct Settings {
    pub backend: String,
    pub backend_config: BackendConfig,
    pub runtime: RuntimeConfig,
}

pub fn resolve<F>(
    file: FileConfig,
    overrides: Overrides,
    registry: &BackendRegistry,
    env: &EnvAdapter<F>,
) -> Result<Settings, BackendError>
where
    F: Fn(&str) -> Option<String>,
{
    let backend = overrides
        .backend
        .or(file.backend)
        .unwrap_or_else(|| DEFAULT_BACKEND.to_string());

    let mut runtime = file.runtime;
    if let Some(concurrency) = overrides.concurrency {
        runtime.concurrency = concurrency;
    }
    if let Some(max_attempts) = overrides.max_attempts {
        runtime.max_attempts = max_attempts;
    }
    if let Some(timeout) = overrides.timeout {
        runtime.query_timeout = timeout;
    }
    if overrides.no_cache {
        runtime.cache.enabled = false;
    }

    let mut backend_config = BackendConfig::new(
        overrides
            .model
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    );
    backend_config.endpoint = overrides.endpoint.or(file.endpoint);
    backend_config.api_key = match (overrides.api_key, file.api_key) {
        (Some(key), _) => Some(ApiCredential::new(
            key,
            CredentialSource::Programmatic,
            "--api-key",
        )),
        (None, Some(key)) => Some(ApiCredential::new(key, CredentialSource::Config, "api_key")),
        (None, None) => None,
    };

    let backend_config = env.apply_for(registry, &backend, backend_config)?;
    if let Some(key) = &backend_config.api_key {
        tracing::debug!(backend = %backend, credential = %key, "Resolved credential");
    }

    Ok(Settings {
        backend,
        backend_config,
        runtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &'static [(&'static str, &'static str)]) -> EnvAdapter<impl Fn(&str) -> Option<String>> {
        EnvAdapter::with_lookup(move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    #[test]
    fn test_defaults_with_env_key() {
        let registry = BackendRegistry::with_defaults();
        let settings = resolve(
            FileConfig::default(),
            Overrides::default(),
            &registry,
            &env(&[("OPENAI_API_KEY", "env-key")]),
        )
        .unwrap();

        assert_eq!(settings.backend, "openai");
        assert_eq!(settings.backend_config.model_name, DEFAULT_MODEL);
        let key = settings.backend_config.api_key.unwrap();
        assert_eq!(key.expose(), "env-key");
        assert_eq!(key.source(), CredentialSource::Environment);
        assert_eq!(settings.runtime, RuntimeConfig::default());
    }

    #[test]
    fn test_precedence() {
        let registry = BackendRegistry::with_defaults();
        let file: FileConfig = serde_yaml::from_str(
            r#"
backend: github
model: file-model
api_key: file-key
runtime:
  concurrency: 8
  max_attempts: 3
"#,
        )
        .unwrap();

        let overrides = Overrides {
            model: Some("flag-model".to_string()),
            max_attempts: Some(1),
            no_cache: true,
            ..Default::default()
        };

        let settings = resolve(
            file,
            overrides,
            &registry,
            &env(&[("GITHUB_TOKEN", "env-token")]),
        )
        .unwrap();

        assert_eq!(settings.backend, "github");
        assert_eq!(settings.backend_config.model_name, "flag-model");
        let key = settings.backend_config.api_key.unwrap();
        assert_eq!(key.expose(), "file-key");
        assert_eq!(key.source(), CredentialSource::Config);
        assert_eq!(settings.runtime.concurrency, 8);
        assert_eq!(settings.runtime.max_attempts, 1);
        assert!(!settings.runtime.cache.enabled);
    }

    #[test]
    fn test_flag_key_wins() {
        let registry = BackendRegistry::with_defaults();
        let file = FileConfig {
            api_key: Some("file-key".to_string()),
            ..Default::default()
        };
        let overrides = Overrides {
            api_key: Some("flag-key".to_string()),
            timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        };

        let settings = resolve(file, overrides, &registry, &env(&[])).unwrap();
        assert_eq!(settings.backend_config.api_key.unwrap().expose(), "flag-key");
        assert_eq!(settings.runtime.query_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_backend() {
        let registry = BackendRegistry::with_defaults();
        let overrides = Overrides {
            backend: Some("invalid_backend".to_string()),
            ..Default::default()
        };

        let err = resolve(FileConfig::default(), overrides, &registry, &env(&[])).unwrap_err();
        assert!(err.to_string().contains("invalid_backend"));
    }

    #[test]
    fn test_config_file_rejects_unknown_keys() {
        assert!(serde_yaml::from_str::<FileConfig>("provider: openai").is_err());
    }
}
