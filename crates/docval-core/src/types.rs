//! Result types shared by the normalizer, the orchestrator and the report.

use serde::{Deserialize, Serialize};

/// A normalized model verdict, not yet bound to a spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    /// Whether the document satisfies the rule
    pub passed: bool,

    /// Confidence in the verdict (0.0 - 1.0)
    pub confidence: f64,

    /// Model explanation, or the raw response when nothing could be parsed
    pub reasoning: String,
}

impl Judgment {
    /// Build a judgment, clamping confidence into [0, 1].
    ///
    /// NaN is treated as "no confidence" and becomes 0.0.
    pub fn new(passed: bool, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            passed,
            confidence: clamp_confidence(confidence),
            reasoning: reasoning.into(),
        }
    }

    /// The fail-safe verdict used whenever no pass/fail signal exists.
    pub fn failure(reasoning: impl Into<String>) -> Self {
        Self {
            passed: false,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

/// Outcome of evaluating one spec against one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Name of the spec this result belongs to
    pub spec_name: String,

    /// Whether the spec passed
    pub passed: bool,

    /// Confidence in the verdict (0.0 - 1.0)
    pub confidence: f64,

    /// Explanation of the verdict
    pub reasoning: String,
}

impl ValidationResult {
    /// Bind a normalized judgment to a spec name.
    pub fn from_judgment(spec_name: impl Into<String>, judgment: Judgment) -> Self {
        Self {
            spec_name: spec_name.into(),
            passed: judgment.passed,
            confidence: clamp_confidence(judgment.confidence),
            reasoning: judgment.reasoning,
        }
    }

    /// Failing result for a spec whose query could not be completed.
    pub fn failure(spec_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            spec_name: spec_name.into(),
            passed: false,
            confidence: 0.0,
            reasoning: format!("Validation failed: {}", reason),
        }
    }
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
