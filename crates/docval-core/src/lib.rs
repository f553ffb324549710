//! # docval-core
//!
//! Deterministic building blocks for docval.
//!
//! This crate answers everything about a validation run that does not need
//! a model:
//! - What text does the document contain?
//! - Which rules should it be checked against?
//! - What did the model actually say?
//! - How did the run go overall?
//!
//! ## Key Guarantees
//!
//! 1. **No network**: backends live in `docval-runtime`
//! 2. **Stable extraction**: identical documents render identical text
//! 3. **Fail-safe normalization**: an unreadable judgment never counts as a pass
//! 4. **Total aggregation**: summarizing never fails, even for zero results
//!
//! ## Example
//!
//! ```rust,ignore
//! use docval_core::{normalize, summarize, DocxExtractor, SpecSet, ValidationResult};
//!
//! let document = DocxExtractor::new().parse("report.docx")?;
//! let specs = SpecSet::from_file("specs.yaml")?;
//!
//! let judgment = normalize(r#"{"passed": true, "confidence": 0.9, "reasoning": "ok"}"#);
//! let result = ValidationResult::from_judgment("Has Title", judgment);
//! let report = summarize(specs.as_slice(), vec![result]);
//! println!("{:.0}% passed", report.pass_rate * 100.0);
//! ```

pub mod document;
pub mod normalizer;
pub mod report;
pub mod specs;
pub mod types;

// Re-export main types at crate root
pub use document::{Block, Document, DocumentMetadata, DocxExtractor, ExtractError, Paragraph};
pub use normalizer::{normalize, DEFAULT_CONFIDENCE};
pub use report::{summarize, CategorySummary, ValidationReport};
pub use specs::{SpecError, SpecSet, ValidationSpec, DEFAULT_CATEGORY};
pub use types::{Judgment, ValidationResult};
