//! Human-readable and machine-readable output.

use anyhow::Result;
use clap::ValueEnum;
use std::fmt::Write;

use docval_core::{Document, ValidationReport};
use docval_runtime::BackendInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Yaml,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InspectFormat {
    Text,
    Json,
}

pub fn report(report: &ValidationReport, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Json => report.to_json_pretty()?,
        ReportFormat::Yaml => report.to_yaml()?,
        ReportFormat::Text => report_text(report),
    })
}

fn report_text(report: &ValidationReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Validation report: {}/{} passed ({:.1}%)",
        report.passed_count,
        report.total,
        report.pass_rate * 100.0
    );
    out.push('\n');

    for result in &report.results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        let _ = writeln!(
            out,
            "  [{}] {} (confidence {:.2})",
            status, result.spec_name, result.confidence
        );
        for line in result.reasoning.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "         {}", line.trim());
        }
    }

    if !report.by_category.is_empty() {
        out.push_str("\nBy category:\n");
        for (category, summary) in &report.by_category {
            let _ = writeln!(
                out,
                "  {}: {}/{} passed",
                category, summary.passed_count, summary.total
            );
        }
    }

    out
}

pub fn document(document: &Document, format: InspectFormat) -> Result<String> {
    Ok(match format {
        InspectFormat::Json => serde_json::to_string_pretty(document)?,
        InspectFormat::Text => document_text(document),
    })
}

fn document_text(document: &Document) -> String {
    let meta = &document.metadata;
    let mut out = String::new();

    let fields = [
        ("Title", meta.title.as_deref()),
        ("Author", meta.author.as_deref()),
        ("Subject", meta.subject.as_deref()),
        ("Keywords", meta.keywords.as_deref()),
        ("Last modified by", meta.last_modified_by.as_deref()),
    ];
    for (label, value) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "{}: {}", label, value);
        }
    }
    if let Some(created) = meta.created {
        let _ = writeln!(out, "Created: {}", created.to_rfc3339());
    }
    if let Some(modified) = meta.modified {
        let _ = writeln!(out, "Modified: {}", modified.to_rfc3339());
    }
    let _ = writeln!(
        out,
        "Paragraphs: {}  Headings: {}  Tables: {}  Words: {}",
        meta.paragraph_count, meta.heading_count, meta.table_count, meta.word_count
    );

    out.push('\n');
    out.push_str(&document.text());
    out.push('\n');
    out
}

pub fn backends(infos: &[BackendInfo]) -> String {
    let mut out = String::new();
    for info in infos {
        let _ = writeln!(out, "{:<10} {}", info.name, info.description);
        let _ = writeln!(out, "           implementation: {}", info.implementation);
        let _ = writeln!(out, "           api key:        ${}", info.credential_env);
        match (info.default_endpoint, info.endpoint_env) {
            (Some(endpoint), Some(env)) => {
                let _ = writeln!(out, "           endpoint:       {} (override with ${})", endpoint, env);
            }
            (Some(endpoint), None) => {
                let _ = writeln!(out, "           endpoint:       {}", endpoint);
            }
            (None, Some(env)) => {
                let _ = writeln!(out, "           endpoint:       required (${})", env);
            }
            (None, None) => {
                let _ = writeln!(out, "           endpoint:       required");
            }
        }
    }
    out
}
