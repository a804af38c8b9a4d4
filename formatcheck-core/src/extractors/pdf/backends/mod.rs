//! PDF text backend trait
//!
//! Backends turn PDF bytes into plain text per page. Nothing about fonts or
//! geometry survives, which is why the checks on this path are heuristic.

use super::FlattenedDocument;
use anyhow::Result;

/// Backend trait for PDF text extraction
pub trait PdfTextBackend: Send + Sync {
    /// Extract text for at most `max_pages` leading pages, plus the total page count.
    ///
    /// Fails only when the document itself cannot be opened. A page whose
    /// text cannot be recovered contributes an empty string.
    fn extract(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<FlattenedDocument>;

    /// Backend identifier for logging
    fn name(&self) -> &str;
}

#[cfg(feature = "pdf")]
pub mod lopdf;

#[cfg(feature = "pdf")]
pub use self::lopdf::LopdfBackend;
