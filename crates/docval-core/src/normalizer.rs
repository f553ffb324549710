//! Response normalization: raw model text into a fixed-shape [`Judgment`].
//!
//! Models are asked to answer with a JSON object, but they do not always
//! comply. The normalizer runs an ordered chain of pure parsers and returns
//! the first one that recovers a pass/fail signal:
//!
//! 1. Strict JSON: the whole response is an object
//! 2. Embedded JSON: a fenced block or a `{...}` object inside prose
//! 3. Heuristic: verdict markers and keywords in free text
//!
//! If every parser gives up, the result is a failing judgment with zero
//! confidence that carries the raw response as its reasoning. An unreadable
//! answer must never count as a pass: a verdict field or marker that is
//! present but unreadable, or a hedged answer, fails safe as well.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::types::Judgment;

/// Confidence used when a response carries a verdict but no confidence.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

type Parser = fn(&str) -> Option<Judgment>;

const PARSERS: &[(&str, Parser)] = &[
    ("strict_json", parse_strict_json),
    ("embedded_json", parse_embedded_json),
    ("heuristic", parse_heuristic),
];

const PASSED_KEYS: &[&str] = &["passed", "pass", "valid", "compliant"];
const VERDICT_KEYS: &[&str] = &["result", "verdict", "status"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "score"];
const REASONING_KEYS: &[&str] = &["reasoning", "reason", "explanation"];

lazy_static! {
    /// ```json ... ``` or ``` ... ``` fenced object
    static ref FENCED_JSON: Regex = Regex::new(
        r"(?s)```(?:json)?\s*(\{.*?\})\s*```"
    ).unwrap();

    /// Explicit marker such as `Passed: no` or `Result = PASS`
    static ref VERDICT_MARKER: Regex = Regex::new(
        r"(?i)\b(?:passed|pass|result|verdict|valid)\b\**\s*[:=]\s*\**\s*(true|false|yes|no|passed|pass|failed|fail)\b"
    ).unwrap();

    /// Verdict marker with any value, checked after [`VERDICT_MARKER`]
    static ref ANY_VERDICT_MARKER: Regex = Regex::new(
        r"(?i)\b(?:passed|pass|result|verdict|valid)\b\**\s*[:=]\s*\**\s*([^\s*.,;]+)"
    ).unwrap();

    /// `"key":` positions in JSON-looking text
    static ref JSON_KEY: Regex = Regex::new(
        r#""[^"\n]*"\s*:"#
    ).unwrap();

    static ref HEDGE: Regex = Regex::new(
        r"(?i)\b(?:(?:cannot|can't|can\s+not|unable\s+to|could\s+not|couldn't)\s+(?:be\s+)?(?:determine\w*|tell|say|assess\w*|verif\w*|evaluat\w*|confirm\w*|decide\w*)|unclear|not\s+sure|uncertain|inconclusive|insufficient\s+(?:information|context))\b"
    ).unwrap();

    static ref LEADING_YES_NO: Regex = Regex::new(
        r"(?i)^\W*(yes|no)\b"
    ).unwrap();

    /// "No issues found" and the like open an affirmative answer
    static ref NO_PROBLEMS: Regex = Regex::new(
        r"(?i)^\W*no\s+(?:issues?|problems?|errors?|violations?|concerns?)\b"
    ).unwrap();

    static ref NEGATIVE_KEYWORDS: Regex = Regex::new(
        r"(?i)\b(?:fail(?:s|ed|ing)?|false|does\s+not|doesn't|do\s+not|is\s+not|not\s+(?:met|meet|pass\w*|satisf\w*|compl\w*|contain\w*|include\w*|present)|missing|absent|lacks?|violat\w*|non-compliant)\b"
    ).unwrap();

    static ref AFFIRMATIVE_KEYWORDS: Regex = Regex::new(
        r"(?i)\b(?:pass(?:es|ed)?|true|yes|meets|satisf(?:ies|ied)|compliant|complies)\b"
    ).unwrap();

    /// `confidence: 0.8`, `Confidence level 85%`, `confidence of 0.7`
    static ref CONFIDENCE_VALUE: Regex = Regex::new(
        r"(?i)\bconfidence(?:\s+(?:score|level))?\**\s*(?:[:=]|is|of)?\s*\**\s*(-?\d+(?:\.\d+)?)\s*(%)?"
    ).unwrap();
}

/// Normalize a raw model response.
///
/// Always returns a judgment; confidence is always within [0, 1].
pub fn normalize(raw: &str) -> Judgment {
    for (name, parser) in PARSERS {
        if let Some(judgment) = parser(raw) {
            tracing::trace!(parser = name, passed = judgment.passed, "Normalized response");
            return judgment;
        }
    }

    tracing::debug!("No verdict recoverable from response, failing safe");
    Judgment::failure(raw)
}

fn parse_strict_json(raw: &str) -> Option<Judgment> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    judgment_from_value(&value, raw)
}

fn parse_embedded_json(raw: &str) -> Option<Judgment> {
    if let Some(judgment) = FENCED_JSON
        .captures_iter(raw)
        .filter_map(|c| serde_json::from_str::<Value>(&c[1]).ok())
        .find_map(|v| judgment_from_value(&v, raw))
    {
        return Some(judgment);
    }

    balanced_objects(raw)
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .find_map(|v| judgment_from_value(&v, raw))
}

fn parse_heuristic(raw: &str) -> Option<Judgment> {
    let passed = if let Some(caps) = VERDICT_MARKER.captures(raw) {
        parse_bool_word(&caps[1])?
    } else if ANY_VERDICT_MARKER.is_match(raw) {
        return None;
    } else {
        let text = JSON_KEY.replace_all(raw, " ");
        if HEDGE.is_match(&text) {
            return None;
        }

        match LEADING_YES_NO.captures(&text) {
            Some(caps) if !NO_PROBLEMS.is_match(&text) => caps[1].eq_ignore_ascii_case("yes"),
            _ if NEGATIVE_KEYWORDS.is_match(&text) => false,
            _ if AFFIRMATIVE_KEYWORDS.is_match(&text) => true,
            _ => return None,
        }
    };

    let confidence = CONFIDENCE_VALUE
        .captures(raw)
        .and_then(|caps| {
            let value: f64 = caps[1].parse().ok()?;
            Some(if caps.get(2).is_some() { value / 100.0 } else { value })
        })
        .unwrap_or(DEFAULT_CONFIDENCE);

    Some(Judgment::new(passed, confidence, raw.trim()))
}

/// Verdict read from a JSON object.
enum Verdict {
    Missing,
    Unreadable,
    Read(bool),
}

/// `None` when the object carries no verdict field at all.
fn judgment_from_value(value: &Value, raw: &str) -> Option<Judgment> {
    let object = value.as_object()?;
    let passed = match extract_passed(object) {
        Verdict::Read(passed) => passed,
        Verdict::Unreadable => {
            tracing::debug!("Verdict field present but unreadable, failing safe");
            return Some(Judgment::failure(raw.trim()));
        }
        Verdict::Missing => return None,
    };

    let confidence = CONFIDENCE_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(confidence_from_value))
        .unwrap_or(DEFAULT_CONFIDENCE);

    let reasoning = REASONING_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .unwrap_or_default();

    Some(Judgment::new(passed, confidence, reasoning))
}

/// The first verdict key present decides.
fn extract_passed(object: &Map<String, Value>) -> Verdict {
    let Some(value) = PASSED_KEYS
        .iter()
        .chain(VERDICT_KEYS)
        .find_map(|key| object.get(*key))
    else {
        return Verdict::Missing;
    };

    let passed = match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool_word(s),
        _ => None,
    };
    passed.map_or(Verdict::Unreadable, Verdict::Read)
}

fn confidence_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(percent) => percent.trim().parse::<f64>().ok().map(|v| v / 100.0),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
}

fn parse_bool_word(word: &str) -> Option<bool> {
    match word.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "pass" | "passed" | "ok" | "compliant" | "satisfied" => Some(true),
        "false" | "no" | "fail" | "failed" | "non-compliant" | "not satisfied" => Some(false),
        _ => None,
    }
}

/// Top-level `{...}` spans in `text`, skipping braces inside JSON strings.
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans.into_iter()
}
