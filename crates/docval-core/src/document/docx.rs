//! `.docx` text extraction.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

use super::properties::parse_core_properties;
use super::{Block, Document, DocumentMetadata, ExtractError, Paragraph, Table};

const BODY_PART: &str = "word/document.xml";
const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

/// Extracts text and metadata from `.docx` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl DocxExtractor {
    /// Expected file extension, without the dot.
    pub const EXTENSION: &'static str = "docx";

    pub fn new() -> Self {
        Self
    }

    /// Parse a `.docx` file.
    ///
    /// Fails with [`ExtractError::NotFound`] for a missing path and
    /// [`ExtractError::InvalidFormat`] for any other extension, before the
    /// file is opened.
    pub fn parse(&self, path: impl AsRef<Path>) -> Result<Document, ExtractError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ExtractError::NotFound(path.to_path_buf()));
        }

        let has_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(Self::EXTENSION));
        if !has_extension {
            return Err(ExtractError::InvalidFormat {
                path: path.to_path_buf(),
                expected: Self::EXTENSION,
            });
        }

        tracing::debug!(path = %path.display(), "Extracting document");
        let file = File::open(path)?;
        self.parse_reader(BufReader::new(file))
    }

    /// Parse a `.docx` container from any seekable reader.
    pub fn parse_reader<R: Read + Seek>(&self, reader: R) -> Result<Document, ExtractError> {
        let mut archive = ZipArchive::new(reader)?;

        let body = read_part(&mut archive, BODY_PART)?
            .ok_or_else(|| ExtractError::MissingPart(BODY_PART.to_string()))?;
        let blocks = parse_body(&body)?;

        let metadata = match read_part(&mut archive, CORE_PROPERTIES_PART)? {
            Some(xml) => parse_core_properties(&xml)?,
            None => DocumentMetadata::default(),
        };

        Ok(Document::new(blocks, metadata))
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    match archive.by_name(name) {
        Ok(mut part) => {
            let mut contents = String::new();
            part.read_to_string(&mut contents)?;
            Ok(Some(contents))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(super) fn xml_error(part: &str, error: impl std::fmt::Display) -> ExtractError {
    ExtractError::Xml {
        part: part.to_string(),
        message: error.to_string(),
    }
}

pub(super) fn attribute(element: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local_name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Walks `w:body`, collecting paragraphs and outermost tables in order.
///
/// Nested tables and text-box paragraphs are flattened into their
/// enclosing cell or paragraph.
#[derive(Default)]
struct BodyWalker {
    blocks: Vec<Block>,
    paragraph: Option<Paragraph>,
    paragraph_depth: usize,
    table: Option<Table>,
    table_depth: usize,
    row: Option<Vec<String>>,
    cell: Option<String>,
    properties_depth: usize,
    in_text: bool,
}

impl BodyWalker {
    fn start(&mut self, element: &BytesStart<'_>) {
        match element.local_name().as_ref() {
            b"p" => {
                self.paragraph_depth += 1;
                if self.paragraph.is_none() {
                    self.paragraph = Some(Paragraph {
                        style: None,
                        text: String::new(),
                    });
                }
            }
            b"pPr" | b"rPr" => self.properties_depth += 1,
            b"t" => self.in_text = !self.in_properties(),
            b"tbl" => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.table = Some(Table::default());
                }
            }
            b"tr" if self.table_depth == 1 => self.row = Some(Vec::new()),
            b"tc" if self.table_depth == 1 => self.cell = Some(String::new()),
            _ => self.empty(element),
        }
    }

    fn in_properties(&self) -> bool {
        self.properties_depth > 0
    }

    fn empty(&mut self, element: &BytesStart<'_>) {
        let in_properties = self.in_properties();
        let Some(paragraph) = self.paragraph.as_mut() else {
            return;
        };

        match element.local_name().as_ref() {
            b"pStyle" if paragraph.style.is_none() => {
                paragraph.style = attribute(element, b"val");
            }
            b"tab" if !in_properties => paragraph.text.push('\t'),
            b"br" | b"cr" if !in_properties => paragraph.text.push('\n'),
            _ => {}
        }
    }

    fn end(&mut self, local_name: &[u8]) {
        match local_name {
            b"p" => {
                self.paragraph_depth = self.paragraph_depth.saturating_sub(1);
                if self.paragraph_depth == 0 {
                    if let Some(paragraph) = self.paragraph.take() {
                        self.finish_paragraph(paragraph);
                    }
                }
            }
            b"pPr" | b"rPr" => self.properties_depth = self.properties_depth.saturating_sub(1),
            b"t" => self.in_text = false,
            b"tc" if self.table_depth == 1 => {
                if let (Some(row), Some(cell)) = (self.row.as_mut(), self.cell.take()) {
                    row.push(cell);
                }
            }
            b"tr" if self.table_depth == 1 => {
                if let (Some(table), Some(row)) = (self.table.as_mut(), self.row.take()) {
                    table.rows.push(row);
                }
            }
            b"tbl" => {
                if self.table_depth == 1 {
                    if let Some(table) = self.table.take() {
                        self.blocks.push(Block::Table(table));
                    }
                }
                self.table_depth = self.table_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            if let Some(paragraph) = self.paragraph.as_mut() {
                paragraph.text.push_str(text);
            }
        }
    }

    fn finish_paragraph(&mut self, paragraph: Paragraph) {
        if self.table_depth > 0 {
            if let Some(cell) = self.cell.as_mut() {
                let text = paragraph.text.trim();
                if !text.is_empty() {
                    if !cell.is_empty() {
                        cell.push(' ');
                    }
                    cell.push_str(text);
                }
            }
        } else if !paragraph.text.trim().is_empty() {
            self.blocks.push(Block::Paragraph(paragraph));
        }
    }
}

fn parse_body(xml: &str) -> Result<Vec<Block>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut walker = BodyWalker::default();

    loop {
        match reader.read_event().map_err(|e| xml_error(BODY_PART, e))? {
            Event::Start(e) => walker.start(&e),
            Event::Empty(e) => walker.empty(&e),
            Event::End(e) => walker.end(e.local_name().as_ref()),
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| xml_error(BODY_PART, e))?;
                walker.text(&text);
            }
            Event::CData(c) => walker.text(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(walker.blocks)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    pub(crate) fn wrap_body(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}<w:sectPr/></w:body></w:document>"#,
            body
        )
    }

    pub(crate) fn build_docx(document_xml: &str, core_xml: Option<&str>) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();

        writer.start_file(BODY_PART, options).unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();

        if let Some(core) = core_xml {
            writer.start_file(CORE_PROPERTIES_PART, options).unwrap();
            writer.write_all(core.as_bytes()).unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("docval-core-{}-{}", std::process::id(), name))
    }

    const TITLED_BODY: &str = r#"
<w:p><w:pPr><w:pStyle w:val="Title"/></w:pPr><w:r><w:t>Annual Report</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Revenue </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>grew &amp; margins held.</w:t></w:r></w:p>
<w:p/>
<w:tbl>
  <w:tr><w:tc><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Q1</w:t></w:r></w:p></w:tc></w:tr>
  <w:tr><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p><w:p><w:r><w:t>(incl. islands)</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>12</w:t></w:r></w:p></w:tc></w:tr>
</w:tbl>
<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>Outlook</w:t></w:r></w:p>
<w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line</w:t><w:tab/><w:t>two</w:t></w:r></w:p>
"#;

    #[test]
    fn test_extracts_blocks_in_order() {
        let bytes = build_docx(&wrap_body(TITLED_BODY), None);
        let document = DocxExtractor::new().parse_reader(Cursor::new(bytes)).unwrap();

        assert_eq!(document.blocks.len(), 5);
        assert_eq!(
            document.blocks[0],
            Block::Paragraph(Paragraph {
                style: Some("Title".to_string()),
                text: "Annual Report".to_string(),
            })
        );
        assert_eq!(
            document.blocks[2],
            Block::Table(Table {
                rows: vec![
                    vec!["Region".to_string(), "Q1".to_string()],
                    vec!["North (incl. islands)".to_string(), "12".to_string()],
                ],
            })
        );
        assert_eq!(
            document.text(),
            "# Annual Report\nRevenue grew & margins held.\n| Region | Q1 |\n| North (incl. islands) | 12 |\n## Outlook\nLine one\nLine\ttwo"
        );
    }

    #[test]
    fn test_extraction_is_stable() {
        let bytes = build_docx(&wrap_body(TITLED_BODY), None);
        let extractor = DocxExtractor::new();
        let first = extractor.parse_reader(Cursor::new(bytes.clone())).unwrap();
        let second = extractor.parse_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(first.text(), second.text());
    }

    #[test]
    fn test_missing_body_part() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let result = DocxExtractor::new().parse_reader(Cursor::new(bytes));
        assert!(matches!(result, Err(ExtractError::MissingPart(part)) if part == BODY_PART));
    }

    #[test]
    fn test_parse_file_not_found() {
        let result = DocxExtractor::new().parse("nonexistent_file.docx");
        assert!(matches!(result, Err(ExtractError::NotFound(_))));
    }

    #[test]
    fn test_parse_invalid_extension() {
        let path = temp_path("notes.txt");
        std::fs::write(&path, "test").unwrap();

        let result = DocxExtractor::new().parse(&path);
        std::fs::remove_file(&path).unwrap();

        let err = result.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidFormat { expected: "docx", .. }));
        assert!(err.to_string().contains("must be a .docx file"));
    }

    #[test]
    fn test_parse_not_a_zip() {
        let path = temp_path("fake.docx");
        std::fs::write(&path, "plain text, not a container").unwrap();

        let result = DocxExtractor::new().parse(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(ExtractError::Archive(_))));
    }

    #[test]
    fn test_parse_from_disk_uppercase_extension() {
        let path = temp_path("REPORT.DOCX");
        std::fs::write(&path, build_docx(&wrap_body(TITLED_BODY), None)).unwrap();

        let result = DocxExtractor::new().parse(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(result.unwrap().metadata.heading_count, 2);
    }

    #[test]
    fn test_malformed_xml() {
        let bytes = build_docx("<w:document><w:body><w:p></w:body>", None);
        let result = DocxExtractor::new().parse_reader(Cursor::new(bytes));
        assert!(matches!(result, Err(ExtractError::Xml { .. })));
    }
}
