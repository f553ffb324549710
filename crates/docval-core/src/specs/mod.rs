//! Validation spec parsing and validation.
//!
//! Specs are structured data validated against JSON Schema.
//! This module handles parsing YAML/JSON spec files and validating them.

mod parser;
mod schema;

pub use parser::{SpecError, SpecSet, ValidationSpec, DEFAULT_CATEGORY};
pub use schema::validate_specs_schema;
