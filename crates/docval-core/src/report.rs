//! Report aggregation: per-spec results into a run summary.
//!
//! Aggregation is a pure, total function. It never fails, and a report is
//! always recomputed from its result sequence rather than patched.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::specs::ValidationSpec;
use crate::types::ValidationResult;

/// Category used for results whose spec is not in the spec list.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Pass counts for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub total: usize,
    pub passed_count: usize,
}

impl CategorySummary {
    pub fn failed_count(&self) -> usize {
        self.total - self.passed_count
    }
}

/// Aggregated outcome of all specs against one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Results in spec evaluation order
    pub results: Vec<ValidationResult>,

    pub total: usize,

    pub passed_count: usize,

    pub failed_count: usize,

    /// `passed_count / total`, or 0 for an empty run
    pub pass_rate: f64,

    /// Per-category counts in first-seen order
    pub by_category: IndexMap<String, CategorySummary>,
}

/// Summarize results into a report.
///
/// Categories are looked up by spec name in `specs`.
pub fn summarize(specs: &[ValidationSpec], results: Vec<ValidationResult>) -> ValidationReport {
    let total = results.len();
    let passed_count = results.iter().filter(|r| r.passed).count();
    let failed_count = total - passed_count;
    let pass_rate = if total == 0 {
        0.0
    } else {
        passed_count as f64 / total as f64
    };

    let mut by_category: IndexMap<String, CategorySummary> = IndexMap::new();
    for result in &results {
        let category = specs
            .iter()
            .find(|s| s.name == result.spec_name)
            .map(|s| s.category.as_str())
            .unwrap_or(UNCATEGORIZED);

        let entry = by_category.entry(category.to_string()).or_default();
        entry.total += 1;
        if result.passed {
            entry.passed_count += 1;
        }
    }

    ValidationReport {
        results,
        total,
        passed_count,
        failed_count,
        pass_rate,
        by_category,
    }
}

impl ValidationReport {
    /// Results that failed, in evaluation order.
    pub fn failed(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    /// Find the result for a spec.
    pub fn result(&self, spec_name: &str) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.spec_name == spec_name)
    }

    /// True only when at least one spec ran and every spec passed.
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.failed_count == 0
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
