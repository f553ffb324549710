//! Core properties (`docProps/core.xml`).

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::docx::xml_error;
use super::{DocumentMetadata, ExtractError};

const PART: &str = "docProps/core.xml";

/// Parse Dublin Core properties into metadata.
///
/// Unparseable timestamps are dropped rather than failing the extraction.
pub(super) fn parse_core_properties(xml: &str) -> Result<DocumentMetadata, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut metadata = DocumentMetadata::default();
    let mut current: Option<Vec<u8>> = None;

    loop {
        match reader.read_event().map_err(|e| xml_error(PART, e))? {
            Event::Start(e) => current = Some(e.local_name().as_ref().to_vec()),
            Event::End(_) => current = None,
            Event::Text(t) => {
                let Some(field) = current.as_deref() else {
                    continue;
                };
                let value = t.unescape().map_err(|e| xml_error(PART, e))?;
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }

                match field {
                    b"title" => metadata.title = Some(value.to_string()),
                    b"creator" => metadata.author = Some(value.to_string()),
                    b"subject" => metadata.subject = Some(value.to_string()),
                    b"keywords" => metadata.keywords = Some(value.to_string()),
                    b"lastModifiedBy" => metadata.last_modified_by = Some(value.to_string()),
                    b"created" => metadata.created = parse_timestamp(value),
                    b"modified" => metadata.modified = parse_timestamp(value),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(metadata)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(value, error = %e, "Ignoring unparseable core property timestamp");
            None
        }
    }
}
