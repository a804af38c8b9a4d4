//! DOCX Extractor
//!
//! Opens the zip container and parses the WordprocessingML parts into a
//! [`StructuredDocument`]. `word/document.xml` is required; styles, theme and
//! app properties are optional and degrade to empty defaults when missing or
//! unreadable.

pub mod model;
#[cfg(feature = "docx")]
pub mod xml_parser;

pub use model::*;

use anyhow::{anyhow, Result};
#[cfg(feature = "docx")]
use anyhow::Context;
#[cfg(feature = "docx")]
use std::io::{Cursor, Read};

#[cfg(feature = "docx")]
const DOCUMENT_PART: &str = "word/document.xml";
#[cfg(feature = "docx")]
const STYLES_PART: &str = "word/styles.xml";
#[cfg(feature = "docx")]
const THEME_PART: &str = "word/theme/theme1.xml";
#[cfg(feature = "docx")]
const APP_PART: &str = "docProps/app.xml";

/// Structured-document extractor for Word `.docx` files
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        "DocxExtractor"
    }

    /// Whether this build can read `.docx` at all
    pub fn is_available(&self) -> bool {
        cfg!(feature = "docx")
    }

    #[cfg(feature = "docx")]
    pub fn extract(&self, bytes: &[u8]) -> Result<StructuredDocument> {
        let mut archive =
            zip::ZipArchive::new(Cursor::new(bytes)).context("not a zip container")?;

        let document_xml = read_part(&mut archive, DOCUMENT_PART)?
            .ok_or_else(|| anyhow!("missing {DOCUMENT_PART}"))?;
        let (paragraphs, sections) = xml_parser::parse_document(&document_xml)?;

        let styles = optional_part(&mut archive, STYLES_PART, xml_parser::parse_styles);
        let theme = optional_part(&mut archive, THEME_PART, xml_parser::parse_theme);
        let page_count = optional_part(&mut archive, APP_PART, xml_parser::parse_app_properties);

        tracing::debug!(
            paragraphs = paragraphs.len(),
            sections = sections.len(),
            styles = styles.styles.len(),
            page_count = ?page_count,
            "docx parsed"
        );

        Ok(StructuredDocument {
            paragraphs,
            sections,
            styles,
            theme,
            page_count,
        })
    }

    #[cfg(not(feature = "docx"))]
    pub fn extract(&self, _bytes: &[u8]) -> Result<StructuredDocument> {
        Err(anyhow!("docx support not compiled in"))
    }
}

#[cfg(feature = "docx")]
fn read_part<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(mut file) => {
            let mut content = String::new();
            file.read_to_string(&mut content)
                .with_context(|| format!("reading {name}"))?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("opening {name}")),
    }
}

/// Read and parse an optional part; any failure yields the default value
#[cfg(feature = "docx")]
fn optional_part<R, T, F>(archive: &mut zip::ZipArchive<R>, name: &str, parse: F) -> T
where
    R: Read + std::io::Seek,
    T: Default,
    F: FnOnce(&str) -> Result<T>,
{
    let parsed = read_part(archive, name).and_then(|content| match content {
        Some(xml) => parse(&xml),
        None => Ok(T::default()),
    });
    parsed.unwrap_or_else(|err| {
        let reason = format!("{err:#}");
        tracing::warn!(part = name, error = %reason, "ignoring unreadable docx part");
        T::default()
    })
}
