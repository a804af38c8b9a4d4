use super::signals::{self, DocumentSignals};
use super::{supplementary_findings, Evaluator};
use crate::config::Policy;
use crate::extractors::docx::{join_paragraph_text, DocxExtractor, StructuredDocument};
use crate::types::{rules, DocumentFormat, Finding};

/// Target margin on every side, in inches
pub const TARGET_MARGIN_IN: f64 = 1.0;

/// Margins further than this from the target fail
pub const MARGIN_TOLERANCE_IN: f64 = 0.15;

/// Evaluator for Word documents, measured from their structure
#[derive(Debug, Default)]
pub struct StructuredEvaluator {
    extractor: DocxExtractor,
}

impl StructuredEvaluator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Evaluator for StructuredEvaluator {
    fn evaluate(&self, bytes: &[u8], policy: &Policy) -> Vec<Finding> {
        if !self.extractor.is_available() {
            tracing::debug!("docx support not compiled in, no findings");
            return Vec::new();
        }

        match self.extractor.extract(bytes) {
            Ok(document) => evaluate_document(&document, policy),
            // An empty finding list would score a vacuous 1.0, so an
            // unreadable container fails `file_type` instead.
            Err(err) => {
                let reason = format!("{err:#}");
                tracing::warn!(error = %reason, "unreadable docx container");
                vec![Finding::failed(rules::FILE_TYPE, "Unreadable Word document")]
            }
        }
    }

    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn name(&self) -> &str {
        "StructuredEvaluator"
    }

    fn is_available(&self) -> bool {
        self.extractor.is_available()
    }
}

/// The canonical rule set over a parsed document, followed by any
/// supplementary rules the policy asks for.
pub fn evaluate_document(document: &StructuredDocument, policy: &Policy) -> Vec<Finding> {
    let signals = DocumentSignals::extract(document, policy);
    let total = signals.paragraph_count;
    let tolerance = policy.max_nonconforming_paragraph_ratio;

    let mut findings = vec![
        margins_finding(signals.margins_in),
        ratio_finding(
            rules::FONT_FAMILY,
            format!("Required: {}", policy.font),
            signals.nonconforming_font,
            total,
            tolerance,
        ),
        ratio_finding(
            rules::FONT_SIZE,
            format!("Required: {} pt", policy.font_size),
            signals.nonconforming_size,
            total,
            tolerance,
        ),
        ratio_finding(
            rules::LINE_SPACING,
            format!("Required: {}", policy.line_spacing),
            signals.nonconforming_spacing,
            total,
            tolerance,
        ),
        heading_finding(&signals.unnumbered_headings),
        citation_finding(signals.has_citation),
    ];

    findings.extend(supplementary_findings(
        policy,
        &document.full_text(),
        &join_paragraph_text(document.title_page()),
        document.page_count,
    ));
    findings
}

fn margins_finding(margins_in: Option<[f64; 4]>) -> Finding {
    let Some(margins) = margins_in else {
        return Finding::failed(rules::MARGINS, "No page margins found in the first section");
    };

    let conforms = margins
        .iter()
        .all(|side| (side - TARGET_MARGIN_IN).abs() < MARGIN_TOLERANCE_IN);
    if conforms {
        Finding::passed(rules::MARGINS, "1\" on all sides")
    } else {
        let [top, bottom, left, right] = margins;
        Finding::failed(
            rules::MARGINS,
            format!(
                "Required 1\" on all sides; found top {top:.2}\", bottom {bottom:.2}\", left {left:.2}\", right {right:.2}\""
            ),
        )
    }
}

fn ratio_finding(rule: &str, requirement: String, nonconforming: usize, total: usize, tolerance: f64) -> Finding {
    Finding::new(
        rule,
        signals::within_tolerance(nonconforming, total, tolerance),
        format!("{requirement} ({nonconforming} of {} paragraphs differ)", total.max(1)),
    )
}

fn heading_finding(unnumbered: &[String]) -> Finding {
    if unnumbered.is_empty() {
        return Finding::passed(rules::HEADING_NUMBERING, "Headings numbered like 1, 1.1, 1.2");
    }
    let listed: Vec<String> = unnumbered.iter().map(|text| format!("{:?}", text.trim())).collect();
    Finding::failed(
        rules::HEADING_NUMBERING,
        format!("Headings need numbers like 1, 1.1, 1.2; unnumbered: {}", listed.join(", ")),
    )
}

pub(crate) fn citation_finding(present: bool) -> Finding {
    if present {
        Finding::passed(rules::IEEE_REFERENCES_BLOCK, "References like [1], [2] present")
    } else {
        Finding::failed(rules::IEEE_REFERENCES_BLOCK, "No bracketed numeric citations like [1] found")
    }
}
