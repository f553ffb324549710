//! Response cache.
//!
//! Caches normalized judgments so re-validating an unchanged document
//! against the same rules does not query the backend again.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use docval_core::Judgment;

use crate::config::CacheConfig;
use crate::providers::Backend;

/// Identifies one query: backend, endpoint, model, rule prompt and
/// document text.
///
/// The endpoint keeps the `openai` and `github` keys (and custom endpoints)
/// apart, since they share one implementation name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    backend: String,
    endpoint: Option<String>,
    model: String,
    prompt_hash: u64,
    document_hash: u64,
}

impl CacheKey {
    pub fn new(backend: &dyn Backend, prompt: &str, document_text: &str) -> Self {
        Self {
            backend: backend.name().to_string(),
            endpoint: backend.endpoint().map(str::to_string),
            model: backend.model_name().to_string(),
            prompt_hash: hash_str(prompt),
            document_hash: hash_str(document_text),
        }
    }
}

fn hash_str(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Judgment cache using moka.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<CacheKey, Judgment>,
}

impl ResponseCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Judgment> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, judgment: Judgment) {
        self.cache.insert(key, judgment).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate entry count.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{BackendConfig, BackendError, BackendRegistry};
    use async_trait::async_trait;

    struct Named(&'static str, &'static str);

    #[async_trait]
    impl Backend for Named {
        async fn submit_query(&self, _: &str, _: &str) -> Result<String, BackendError> {
            Ok(String::new())
        }

        fn name(&self) -> &str {
            self.0
        }

        fn model_name(&self) -> &str {
            self.1
        }
    }

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = ResponseCache::default();
        let backend = Named("openai", "gpt-4o-mini");
        let key = CacheKey::new(&backend, "Has Title", "# Report");

        assert!(cache.get(&key).await.is_none());

        let judgment = Judgment::new(true, 0.9, "Title present");
        cache.insert(key.clone(), judgment.clone()).await;
        assert_eq!(cache.get(&key).await, Some(judgment));

        cache.invalidate_all();
        assert!(cache.get(&key).await.is_none());
    }

    #[test]
    fn test_key_distinguishes_inputs() {
        let openai = Named("openai", "gpt-4o-mini");
        let other_model = Named("openai", "gpt-4o");
        let nebula = Named("nebulaone", "gpt-4o-mini");

        let base = CacheKey::new(&openai, "rule", "text");
        assert_eq!(base, CacheKey::new(&openai, "rule", "text"));
        assert_ne!(base, CacheKey::new(&openai, "rule", "other text"));
        assert_ne!(base, CacheKey::new(&openai, "other rule", "text"));
        assert_ne!(base, CacheKey::new(&other_model, "rule", "text"));
        assert_ne!(base, CacheKey::new(&nebula, "rule", "text"));
    }

    #[test]
    fn test_key_distinguishes_endpoints() {
        let registry = BackendRegistry::with_defaults();
        let config = || BackendConfig::new("gpt-4o-mini").with_api_key("test_key");

        let openai = registry.create("openai", &config()).unwrap();
        let github = registry.create("github", &config()).unwrap();
        let custom = registry
            .create("openai", &config().with_endpoint("http://localhost:8080/v1"))
            .unwrap();
        assert_eq!(openai.name(), github.name());

        let key = |backend: &dyn Backend| CacheKey::new(backend, "rule", "text");
        assert_ne!(key(openai.as_ref()), key(github.as_ref()));
        assert_ne!(key(openai.as_ref()), key(custom.as_ref()));
        assert_eq!(key(openai.as_ref()), key(openai.as_ref()));
    }
}
