//! PDF Extractor
//!
//! Flattens a PDF to the plain text of its leading pages. Layout, fonts and
//! spacing are lost on this path; only text and the page count remain.

pub mod backends;

use anyhow::{anyhow, Result};

pub use backends::PdfTextBackend;

#[cfg(feature = "pdf")]
pub use backends::LopdfBackend;

/// Leading pages sampled for text heuristics
pub const TEXT_SAMPLE_PAGES: usize = 5;

/// Text recovered from a fixed-layout document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedDocument {
    /// Text of the sampled leading pages, in page order
    pub pages: Vec<String>,
    /// Total pages in the document, sampled or not
    pub page_count: u32,
}

impl FlattenedDocument {
    pub fn new(pages: Vec<String>, page_count: u32) -> Self {
        Self { pages, page_count }
    }

    pub fn first_page(&self) -> &str {
        self.pages.first().map(String::as_str).unwrap_or("")
    }

    /// All sampled pages joined with newlines
    pub fn text(&self) -> String {
        self.pages.join("\n")
    }
}

/// PDF extractor with pluggable backend
pub struct PdfExtractor {
    backend: Option<Box<dyn PdfTextBackend>>,
}

impl PdfExtractor {
    pub fn with_backend(backend: Box<dyn PdfTextBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Extractor with no backend; every extraction fails
    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("none")
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn extract(&self, pdf_bytes: &[u8]) -> Result<FlattenedDocument> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| anyhow!("no PDF backend compiled in"))?;
        let flattened = backend.extract(pdf_bytes, TEXT_SAMPLE_PAGES)?;
        tracing::debug!(
            backend = backend.name(),
            page_count = flattened.page_count,
            sampled = flattened.pages.len(),
            "pdf flattened"
        );
        Ok(flattened)
    }
}

impl Default for PdfExtractor {
    #[cfg(feature = "pdf")]
    fn default() -> Self {
        Self::with_backend(Box::new(LopdfBackend::new()))
    }

    #[cfg(not(feature = "pdf"))]
    fn default() -> Self {
        Self::unavailable()
    }
}
