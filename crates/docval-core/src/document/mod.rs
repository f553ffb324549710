//! Document extraction.
//!
//! A `.docx` file is a zip container of XML parts. Only the main body
//! (`word/document.xml`) and the core properties (`docProps/core.xml`) are
//! read; images, styles and relationships are ignored.

mod docx;
mod properties;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

pub use docx::DocxExtractor;

/// Errors from document extraction.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("File must be a .{expected} file: {}", .path.display())]
    InvalidFormat {
        path: PathBuf,
        expected: &'static str,
    },

    #[error("Not a valid document container: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Document is missing required part: {0}")]
    MissingPart(String),

    #[error("Malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),
}

/// A body paragraph with its style id (e.g., "Heading1").
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paragraph {
    pub style: Option<String>,
    pub text: String,
}

impl Paragraph {
    /// Markdown-style marker for titles and headings.
    ///
    /// `Title` maps to `#`, `HeadingN` to `N + 1` hashes (at most six).
    pub fn heading_marker(&self) -> Option<String> {
        let style = self.style.as_deref()?.replace(' ', "").to_ascii_lowercase();

        if style == "title" {
            return Some("#".to_string());
        }

        let level: usize = style.strip_prefix("heading")?.parse().ok()?;
        if level == 0 {
            return None;
        }
        Some("#".repeat((level + 1).min(6)))
    }

    pub fn is_heading(&self) -> bool {
        self.heading_marker().is_some()
    }
}

/// A table flattened to rows of cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// Body content in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// Core properties plus structural counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub last_modified_by: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub paragraph_count: usize,
    pub heading_count: usize,
    pub table_count: usize,
    pub word_count: usize,
}

/// An extracted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// Assemble a document, filling the structural counts in `metadata`.
    pub fn new(blocks: Vec<Block>, mut metadata: DocumentMetadata) -> Self {
        let mut word_count = 0;
        for block in &blocks {
            match block {
                Block::Paragraph(p) => {
                    metadata.paragraph_count += 1;
                    if p.is_heading() {
                        metadata.heading_count += 1;
                    }
                    word_count += p.text.split_whitespace().count();
                }
                Block::Table(t) => {
                    metadata.table_count += 1;
                    word_count += t
                        .rows
                        .iter()
                        .flatten()
                        .map(|cell| cell.split_whitespace().count())
                        .sum::<usize>();
                }
            }
        }
        metadata.word_count = word_count;

        Self { blocks, metadata }
    }

    /// Paragraphs in document order, excluding table content.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        })
    }

    pub fn headings(&self) -> impl Iterator<Item = &Paragraph> {
        self.paragraphs().filter(|p| p.is_heading())
    }

    /// Render the document as the text sent to the model.
    ///
    /// One line per paragraph, headings prefixed with their marker, tables
    /// as `| a | b |` rows. Identical documents render identically.
    pub fn text(&self) -> String {
        let mut lines = Vec::new();

        for block in &self.blocks {
            match block {
                Block::Paragraph(p) => match p.heading_marker() {
                    Some(marker) => lines.push(format!("{} {}", marker, p.text.trim())),
                    None => lines.push(p.text.trim().to_string()),
                },
                Block::Table(t) => {
                    for row in &t.rows {
                        let cells: Vec<&str> = row.iter().map(|c| c.trim()).collect();
                        lines.push(format!("| {} |", cells.join(" | ")));
                    }
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(style: Option<&str>, text: &str) -> Block {
        Block::Paragraph(Paragraph {
            style: style.map(String::from),
            text: text.to_string(),
        })
    }

    #[test]
    fn test_heading_markers() {
        let marker = |style: &str| {
            Paragraph {
                style: Some(style.to_string()),
                text: String::new(),
            }
            .heading_marker()
        };
        assert_eq!(marker("Title").as_deref(), Some("#"));
        assert_eq!(marker("Heading1").as_deref(), Some("##"));
        assert_eq!(marker("heading 2").as_deref(), Some("###"));
        assert_eq!(marker("Heading9").as_deref(), Some("######"));
        assert_eq!(marker("Subtitle"), None);
        assert_eq!(marker("HeadingX"), None);
    }

    #[test]
    fn test_counts_and_render() {
        let document = Document::new(
            vec![
                paragraph(Some("Title"), "Quarterly Report"),
                paragraph(None, "Revenue grew."),
                Block::Table(Table {
                    rows: vec![
                        vec!["Region".into(), "Q1".into()],
                        vec!["North".into(), "12".into()],
                    ],
                }),
                paragraph(Some("Heading1"), "Outlook"),
            ],
            DocumentMetadata::default(),
        );

        assert_eq!(document.metadata.paragraph_count, 3);
        assert_eq!(document.metadata.heading_count, 2);
        assert_eq!(document.metadata.table_count, 1);
        assert_eq!(document.metadata.word_count, 2 + 2 + 4 + 1);
        assert_eq!(
            document.text(),
            "# Quarterly Report\nRevenue grew.\n| Region | Q1 |\n| North | 12 |\n## Outlook"
        );
        assert_eq!(document.headings().count(), 2);
    }
}
