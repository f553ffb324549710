//! Credential handling for backends.
//!
//! API keys are wrapped in [`ApiCredential`] as soon as they are read, so
//! they cannot show up in `Debug` or `Display` output or in log fields.
//!
//! Backends never read the process environment themselves. The
//! [`EnvAdapter`] fills missing keys and endpoints from environment
//! variables once, at the program boundary, before a backend is built.
//!
//! ## Usage
//!
//! ```ignore
//! let registry = BackendRegistry::with_defaults();
//! let config = EnvAdapter::process().apply_for(&registry, "openai", BackendConfig::default())?;
//! let backend = registry.create("openai", &config)?;
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::{BackendConfig, BackendError, BackendFactory, BackendRegistry};

/// Where a credential was loaded from.
///
/// Useful for debugging configuration issues without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from a configuration file
    Config,
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically (e.g., a command-line flag)
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` show `[REDACTED]`; the value is only reachable
/// through [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Expose the credential value for use in a request header.
    ///
    /// Call this only where the value is needed and never store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().trim().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Human-readable name (e.g., "OPENAI_API_KEY").
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

type Lookup = fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Fills unset backend configuration from environment variables.
///
/// Values already present in the config are never overwritten, so flags
/// and config files take precedence over the environment. Empty variables
/// are treated as unset.
pub struct EnvAdapter<F = Lookup> {
    lookup: F,
}

impl EnvAdapter {
    /// Adapter over the real process environment.
    pub fn process() -> Self {
        Self {
            lookup: process_env,
        }
    }
}

impl<F> EnvAdapter<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Adapter over an arbitrary variable lookup.
    pub fn with_lookup(lookup: F) -> Self {
        Self { lookup }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// Fill the API key and endpoint for the backend built by `factory`.
    pub fn apply(&self, factory: &dyn BackendFactory, mut config: BackendConfig) -> BackendConfig {
        if config.api_key.is_none() {
            let env_var = factory.credential_env();
            if let Some(value) = self.var(env_var) {
                tracing::debug!(env_var, "Using API key from environment");
                config.api_key = Some(ApiCredential::new(
                    value,
                    CredentialSource::Environment,
                    env_var,
                ));
            }
        }

        if config.endpoint.is_none() {
            if let Some(env_var) = factory.endpoint_env() {
                config.endpoint = self.var(env_var);
            }
        }

        config
    }

    /// Like [`EnvAdapter::apply`], looking the factory up by backend key.
    pub fn apply_for(
        &self,
        registry: &BackendRegistry,
        backend: &str,
        config: BackendConfig,
    ) -> Result<BackendConfig, BackendError> {
        let factory = registry.factory(backend)?;
        Ok(self.apply(&**factory, config))
    }
}

impl<F> fmt::Debug for EnvAdapter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvAdapter").finish_non_exhaustive()
    }
}
