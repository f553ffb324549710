//! # docval-runtime
//!
//! Model-backed validation for docval.
//!
//! `docval-core` knows how to read a document, load rules and interpret an
//! answer. This crate asks the question: it sends each rule with the
//! document text to an LLM backend and turns the answers into a report.
//!
//! ## Backends
//!
//! | Key | Implementation | API key env |
//! |-----|----------------|-------------|
//! | `openai` | `openai` | `OPENAI_API_KEY` |
//! | `github` | `openai` | `GITHUB_TOKEN` |
//! | `nebulaone` | `nebulaone` | `NEBULAONE_API_KEY` |
//!
//! ## Example
//!
//! ```rust,ignore
//! use docval_runtime::{BackendConfig, BackendRegistry, EnvAdapter, RuntimeConfig, Validator};
//!
//! let registry = BackendRegistry::with_defaults();
//! let backend_config = EnvAdapter::process()
//!     .apply_for(&registry, "openai", BackendConfig::new("gpt-4o-mini"))?;
//! let validator =
//!     Validator::from_registry(&registry, "openai", backend_config, RuntimeConfig::default())?;
//!
//! let specs = docval_core::SpecSet::from_file("specs.yaml")?;
//! let report = validator.validate("report.docx", specs.as_slice()).await?;
//! ```

pub mod cache;
pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod providers;

pub use cache::{CacheKey, ResponseCache};
pub use config::{CacheConfig, RuntimeConfig};
pub use orchestrator::{RuntimeError, Validator, ValidatorBuilder};
pub use providers::{
    ApiCredential, Backend, BackendConfig, BackendError, BackendFactory, BackendInfo,
    BackendRegistry, CredentialSource, EnvAdapter, DEFAULT_MODEL,
};
