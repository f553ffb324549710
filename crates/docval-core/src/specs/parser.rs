//! Spec parsing from YAML/JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::schema::validate_specs_schema;

/// Category assigned to specs that do not declare one.
pub const DEFAULT_CATEGORY: &str = "general";

/// Errors that can occur when loading specs.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Failed to read spec file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Spec file does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Duplicate spec name: {0}")]
    DuplicateName(String),

    #[error("Spec file contains no specs")]
    Empty,

    #[error("Unsupported spec file format '{0}': expected .json, .yaml or .yml")]
    UnsupportedFormat(String),
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// A named rule a document is checked against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationSpec {
    /// Unique name within one run (e.g., "Has Title")
    pub name: String,

    /// The natural-language rule sent to the model
    pub description: String,

    /// Grouping label for the report breakdown
    #[serde(default = "default_category")]
    pub category: String,
}

impl ValidationSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category: category.into(),
        }
    }
}

/// An ordered, validated list of specs.
///
/// Order is significant: it is the evaluation order and the order of
/// results in the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecSet {
    specs: Vec<ValidationSpec>,
}

impl SpecSet {
    /// Build a set from in-memory specs.
    ///
    /// Rejects blank names/descriptions and duplicate names. An empty list
    /// is allowed here; only spec files must be non-empty.
    pub fn new(specs: Vec<ValidationSpec>) -> Result<Self, SpecError> {
        validate(&specs)?;
        Ok(Self { specs })
    }

    /// Parse specs from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse specs from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, SpecError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse specs from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse specs from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a spec file, choosing the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "json" => Self::from_json_file(path),
            "yaml" | "yml" => Self::from_yaml_file(path),
            _ => Err(SpecError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, SpecError> {
        validate_specs_schema(&value).map_err(SpecError::SchemaError)?;

        let specs: Vec<ValidationSpec> = serde_json::from_value(value)?;
        if specs.is_empty() {
            return Err(SpecError::Empty);
        }

        tracing::debug!(count = specs.len(), "Loaded validation specs");
        Self::new(specs)
    }

    pub fn as_slice(&self) -> &[ValidationSpec] {
        &self.specs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Look up a spec by name.
    pub fn get(&self, name: &str) -> Option<&ValidationSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn into_inner(self) -> Vec<ValidationSpec> {
        self.specs
    }
}

impl<'a> IntoIterator for &'a SpecSet {
    type Item = &'a ValidationSpec;
    type IntoIter = std::slice::Iter<'a, ValidationSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.iter()
    }
}

/// Check required fields and name uniqueness.
pub(crate) fn validate(specs: &[ValidationSpec]) -> Result<(), SpecError> {
    let mut seen = HashSet::new();

    for (index, spec) in specs.iter().enumerate() {
        if spec.name.trim().is_empty() {
            return Err(SpecError::MissingField(format!("[{}].name", index)));
        }
        if spec.description.trim().is_empty() {
            return Err(SpecError::MissingField(format!("[{}].description", index)));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(SpecError::DuplicateName(spec.name.clone()));
        }
    }

    Ok(())
}
