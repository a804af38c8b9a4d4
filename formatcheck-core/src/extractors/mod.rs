//! Document Extractors
//!
//! Turn uploaded bytes into something the rule evaluators can measure.
//!
//! ## Architecture
//!
//! ```text
//! .docx bytes ──> [DocxExtractor] ──> StructuredDocument ──> structured rules
//! .pdf bytes  ──> [PdfExtractor]  ──> FlattenedDocument  ──> text heuristics
//! ```
//!
//! Each format sits behind a cargo feature (`docx`, `pdf`). A build without a
//! feature still links the extractor, which then reports itself unavailable.

pub mod docx;
pub mod pdf;

pub use docx::{DocxExtractor, StructuredDocument};
pub use pdf::{FlattenedDocument, PdfExtractor, PdfTextBackend};

use crate::types::DocumentFormat;
use serde::Serialize;

/// Which document formats this build can read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub docx: bool,
    pub pdf: bool,
}

impl Capabilities {
    /// Capabilities compiled into this binary
    pub fn compiled() -> Self {
        Self {
            docx: cfg!(feature = "docx"),
            pdf: cfg!(feature = "pdf"),
        }
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        match format {
            DocumentFormat::Docx => self.docx,
            DocumentFormat::Pdf => self.pdf,
        }
    }

    /// Formats that cannot be read
    pub fn missing(&self) -> Vec<DocumentFormat> {
        [DocumentFormat::Docx, DocumentFormat::Pdf]
            .into_iter()
            .filter(|format| !self.supports(*format))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_unsupported_formats() {
        let caps = Capabilities { docx: true, pdf: false };
        assert!(caps.supports(DocumentFormat::Docx));
        assert_eq!(caps.missing(), vec![DocumentFormat::Pdf]);
        assert!(Capabilities { docx: true, pdf: true }.missing().is_empty());
    }
}
