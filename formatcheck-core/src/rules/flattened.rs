use super::structured::citation_finding;
use super::{signals, supplementary_findings, Evaluator};
use crate::config::Policy;
use crate::extractors::pdf::{FlattenedDocument, PdfExtractor};
use crate::types::{rules, DocumentFormat, Finding};

const UNVERIFIABLE_DETAIL: &str = "PDF heuristic: cannot be verified from extracted text";

/// Layout rules a text-only view cannot check
pub const UNVERIFIABLE_RULES: [&str; 5] = [
    rules::MARGINS,
    rules::FONT_FAMILY,
    rules::FONT_SIZE,
    rules::LINE_SPACING,
    rules::HEADING_NUMBERING,
];

/// Heuristic evaluator for fixed-layout documents
pub struct FlattenedTextEvaluator {
    extractor: PdfExtractor,
}

impl FlattenedTextEvaluator {
    pub fn new(extractor: PdfExtractor) -> Self {
        Self { extractor }
    }
}

impl Default for FlattenedTextEvaluator {
    fn default() -> Self {
        Self::new(PdfExtractor::default())
    }
}

impl Evaluator for FlattenedTextEvaluator {
    fn evaluate(&self, bytes: &[u8], policy: &Policy) -> Vec<Finding> {
        if !self.extractor.is_available() {
            tracing::debug!("pdf support not compiled in, no findings");
            return Vec::new();
        }

        let flattened = match self.extractor.extract(bytes) {
            Ok(flattened) => Some(flattened),
            Err(err) => {
                let reason = format!("{err:#}");
                tracing::warn!(backend = self.extractor.backend_name(), error = %reason, "pdf text unavailable");
                None
            }
        };
        evaluate_text(flattened.as_ref(), policy)
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn name(&self) -> &str {
        "FlattenedTextEvaluator"
    }

    fn is_available(&self) -> bool {
        self.extractor.is_available()
    }
}

/// Findings for a flattened document. The layout rules always fail; the text
/// rules are omitted when no text could be recovered.
pub fn evaluate_text(flattened: Option<&FlattenedDocument>, policy: &Policy) -> Vec<Finding> {
    let mut findings: Vec<Finding> = UNVERIFIABLE_RULES
        .iter()
        .map(|rule| Finding::failed(rule, UNVERIFIABLE_DETAIL))
        .collect();

    let Some(flattened) = flattened else {
        return findings;
    };

    let text = flattened.text();
    findings.push(citation_finding(signals::has_citation_marker(&text)));
    findings.extend(supplementary_findings(
        policy,
        &text,
        flattened.first_page(),
        Some(flattened.page_count),
    ));
    findings
}
