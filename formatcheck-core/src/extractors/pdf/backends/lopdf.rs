use super::PdfTextBackend;
use crate::extractors::pdf::FlattenedDocument;
use anyhow::{Context, Result};
use ::lopdf::Document;
use std::panic::{self, AssertUnwindSafe};

/// Pure-Rust backend built on `lopdf`
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PdfTextBackend for LopdfBackend {
    fn extract(&self, pdf_bytes: &[u8], max_pages: usize) -> Result<FlattenedDocument> {
        let document = Document::load_mem(pdf_bytes).context("opening PDF")?;
        let pages = document.get_pages();
        let page_count = u32::try_from(pages.len()).unwrap_or(u32::MAX);

        let mut sampled = Vec::with_capacity(max_pages.min(pages.len()));
        for &page_number in pages.keys().take(max_pages) {
            // Content stream decoding in lopdf can panic on malformed input
            let extracted = panic::catch_unwind(AssertUnwindSafe(|| {
                document.extract_text(&[page_number])
            }));
            let text = match extracted {
                Ok(Ok(text)) => text,
                Ok(Err(err)) => {
                    tracing::warn!(page = page_number, error = %err, "page text unavailable");
                    String::new()
                }
                Err(_) => {
                    tracing::warn!(page = page_number, "page text extraction panicked");
                    String::new()
                }
            };
            sampled.push(text);
        }

        Ok(FlattenedDocument::new(sampled, page_count))
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_fail_to_open() {
        let backend = LopdfBackend::new();
        assert!(backend.extract(b"definitely not a pdf", 5).is_err());
    }
}
