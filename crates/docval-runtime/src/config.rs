//! Runtime configuration for validation runs.
//!
//! Durations are written in human-readable form (`"60s"`, `"1h 30m"`).
//!
//! ```yaml
//! max_attempts: 3
//! retry_delay: 2s
//! query_timeout: 90s
//! concurrency: 8
//! cache:
//!   enabled: false
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for how specs are queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Attempts per spec, including the first
    pub max_attempts: u32,

    /// Delay between attempts
    #[serde(with = "duration_str")]
    pub retry_delay: Duration,

    /// Upper bound on a single query
    #[serde(with = "duration_str")]
    pub query_timeout: Duration,

    /// Specs in flight at once
    pub concurrency: usize,

    pub temperature: f32,

    pub max_tokens: u32,

    pub cache: CacheConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_secs(1),
            query_timeout: Duration::from_secs(60),
            concurrency: 4,
            temperature: 0.0,
            max_tokens: 1000,
            cache: CacheConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Attempts per spec, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Concurrency, never less than one.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Configuration with caching disabled.
    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,

    pub max_entries: u64,

    /// Time an answer stays cached
    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            ttl: Duration::from_secs(3600),
        }
    }
}

pub(crate) mod duration_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        humantime::parse_duration(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.query_timeout, Duration::from_secs(60));
        assert_eq!(config.concurrency, 4);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_partial_yaml_with_durations() {
        let config: RuntimeConfig = serde_yaml::from_str(
            r#"
max_attempts: 3
query_timeout: 1m 30s
cache:
  ttl: 10m
"#,
        )
        .unwrap();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.query_timeout, Duration::from_secs(90));
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.cache.ttl, Duration::from_secs(600));
        assert_eq!(config.cache.max_entries, 1000);
    }

    #[test]
    fn test_rejects_bad_duration_and_unknown_field() {
        assert!(serde_yaml::from_str::<RuntimeConfig>("query_timeout: soon").is_err());
        assert!(serde_yaml::from_str::<RuntimeConfig>("retries: 3").is_err());
    }

    #[test]
    fn test_floors() {
        let config = RuntimeConfig {
            max_attempts: 0,
            concurrency: 0,
            ..Default::default()
        };
        assert_eq!(config.attempts(), 1);
        assert_eq!(config.effective_concurrency(), 1);
    }

    #[test]
    fn test_duration_serializes_readably() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("query_timeout: 1m"));
        assert!(yaml.contains("ttl: 1h"));
    }
}
