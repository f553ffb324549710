//! Validation orchestrator.
//!
//! The [`Validator`] runs every spec against one document:
//! - Extract the document once (deterministic, fails fast on bad input)
//! - Fan out one query per spec, at most `concurrency` in flight
//! - Bound each query by `query_timeout` and retry transient failures
//! - Normalize each answer and aggregate the results in spec order
//!
//! A spec whose query cannot be completed still yields a failing result;
//! only invalid input aborts a run.

use backon::{ConstantBuilder, Retryable};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

use docval_core::{
    normalize, summarize, DocxExtractor, ExtractError, SpecError, SpecSet, ValidationReport,
    ValidationResult, ValidationSpec,
};

use crate::cache::{CacheKey, ResponseCache};
use crate::config::RuntimeConfig;
use crate::prompts::build_prompt;
use crate::providers::{Backend, BackendConfig, BackendError, BackendRegistry};

/// Errors that abort a validation run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("No backend configured")]
    NoBackend,

    #[error(transparent)]
    Document(#[from] ExtractError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Validates documents against specs using one backend.
pub struct Validator {
    backend: Arc<dyn Backend>,
    config: RuntimeConfig,
    cache: Option<ResponseCache>,
    extractor: DocxExtractor,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("backend", &self.backend.name())
            .field("model", &self.backend.model_name())
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Validator {
    /// Create a validator; a cache is attached when `config.cache.enabled`.
    pub fn new(backend: Arc<dyn Backend>, config: RuntimeConfig) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| ResponseCache::from_config(&config.cache));

        Self {
            backend,
            config,
            cache,
            extractor: DocxExtractor::new(),
        }
    }

    /// Build the backend named `backend` from `registry` and wrap it.
    ///
    /// Temperature and token limits come from `config`, overriding
    /// whatever `backend_config` carried.
    pub fn from_registry(
        registry: &BackendRegistry,
        backend: &str,
        mut backend_config: BackendConfig,
        config: RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        backend_config.temperature = config.temperature;
        backend_config.max_tokens = config.max_tokens;
        backend_config.timeout = config.query_timeout;

        let backend = registry.create(backend, &backend_config)?;
        Ok(Self::new(backend, config))
    }

    /// Replace the cache, e.g. to share one across validators.
    pub fn with_cache(mut self, cache: Option<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Validate a `.docx` file against `specs`.
    ///
    /// Fails before any query is sent if the file cannot be read or the
    /// spec list is invalid.
    pub async fn validate(
        &self,
        document_path: impl AsRef<Path>,
        specs: &[ValidationSpec],
    ) -> Result<ValidationReport, RuntimeError> {
        let document_path = document_path.as_ref();

        SpecSet::new(specs.to_vec())?;
        let document = self.extractor.parse(document_path)?;

        tracing::info!(
            document = %document_path.display(),
            paragraphs = document.metadata.paragraph_count,
            specs = specs.len(),
            backend = self.backend.name(),
            "Validating document"
        );

        Ok(self.validate_text(&document.text(), specs).await)
    }

    /// Validate already-extracted document text against `specs`.
    ///
    /// Results keep spec order regardless of completion order.
    pub async fn validate_text(
        &self,
        document_text: &str,
        specs: &[ValidationSpec],
    ) -> ValidationReport {
        let results: Vec<ValidationResult> = stream::iter(specs)
            .map(|spec| self.evaluate_spec(spec, document_text))
            .buffered(self.config.effective_concurrency())
            .collect()
            .await;

        let report = summarize(specs, results);

        tracing::info!(
            total = report.total,
            passed = report.passed_count,
            failed = report.failed_count,
            "Validation complete"
        );

        report
    }

    async fn evaluate_spec(&self, spec: &ValidationSpec, document_text: &str) -> ValidationResult {
        let prompt = build_prompt(spec);
        let key = self
            .cache
            .as_ref()
            .map(|_| CacheKey::new(self.backend.as_ref(), &prompt, document_text));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(judgment) = cache.get(key).await {
                tracing::debug!(spec = %spec.name, "Cache hit");
                return ValidationResult::from_judgment(&spec.name, judgment);
            }
        }

        match self.query_with_retry(&spec.name, &prompt, document_text).await {
            Ok(raw) => {
                let judgment = normalize(&raw);
                tracing::debug!(
                    spec = %spec.name,
                    passed = judgment.passed,
                    confidence = judgment.confidence,
                    "Spec evaluated"
                );

                if let (Some(cache), Some(key)) = (&self.cache, key) {
                    cache.insert(key, judgment.clone()).await;
                }
                ValidationResult::from_judgment(&spec.name, judgment)
            }
            Err(e) => {
                tracing::warn!(spec = %spec.name, error = %e, "Spec query failed");
                ValidationResult::failure(&spec.name, e)
            }
        }
    }

    async fn query_with_retry(
        &self,
        spec_name: &str,
        prompt: &str,
        document_text: &str,
    ) -> Result<String, BackendError> {
        let backend = self.backend.as_ref();
        let timeout = self.config.query_timeout;
        let retry_delay = self.config.retry_delay;
        let max_attempts = self.config.attempts();
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;

        let query = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(spec = spec_name, attempt, "Submitting query");

            let result =
                match tokio::time::timeout(timeout, backend.submit_query(prompt, document_text))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::Timeout(timeout)),
                };

            // The retry policy waits `retry_delay`; make up the rest of a
            // server-requested wait here, capped at the query timeout.
            if let Err(BackendError::RateLimited {
                retry_after: Some(wait),
            }) = &result
            {
                if attempt < max_attempts {
                    let extra = (*wait).min(timeout).saturating_sub(retry_delay);
                    tracing::debug!(spec = spec_name, ?wait, "Honoring retry-after");
                    tokio::time::sleep(extra).await;
                }
            }

            result
        };

        query
            .retry(
                ConstantBuilder::default()
                    .with_delay(retry_delay)
                    .with_max_times(max_attempts as usize - 1),
            )
            .when(BackendError::is_retryable)
            .notify(|e: &BackendError, delay| {
                tracing::warn!(spec = spec_name, error = %e, ?delay, "Retrying query");
            })
            .await
    }
}

/// Builder for [`Validator`].
pub struct ValidatorBuilder {
    backend: Option<Arc<dyn Backend>>,
    config: RuntimeConfig,
    cache: Option<ResponseCache>,
}

impl ValidatorBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            config: RuntimeConfig::default(),
            cache: None,
        }
    }

    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `cache` instead of one derived from the config.
    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Validator, RuntimeError> {
        let backend = self.backend.ok_or(RuntimeError::NoBackend)?;
        let validator = Validator::new(backend, self.config);

        Ok(match self.cache {
            Some(cache) => validator.with_cache(Some(cache)),
            None => validator,
        })
    }
}

impl Default for ValidatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
