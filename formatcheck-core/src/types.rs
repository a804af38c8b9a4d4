use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::Path;

// ===== RULE VOCABULARY =====

/// Rule identifiers emitted by the evaluators. Weight tables are keyed by these.
pub mod rules {
    pub const MARGINS: &str = "margins";
    pub const FONT_FAMILY: &str = "font_family";
    pub const FONT_SIZE: &str = "font_size";
    pub const LINE_SPACING: &str = "line_spacing";
    pub const HEADING_NUMBERING: &str = "heading_numbering";
    pub const IEEE_REFERENCES_BLOCK: &str = "ieee_references_block";
    pub const REQUIRED_HEADINGS: &str = "required_headings";
    pub const TITLE_PAGE_KEYWORDS: &str = "title_page_keywords";
    pub const PAGE_COUNT_RANGE: &str = "page_count_range";
    pub const FILE_TYPE: &str = "file_type";
}

/// One rule's outcome for one document. Never mutated after an evaluator emits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: String,
    pub pass: bool,
    pub details: String,
}

impl Finding {
    pub fn new(rule: &str, pass: bool, details: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            pass,
            details: details.into(),
        }
    }

    pub fn passed(rule: &str, details: impl Into<String>) -> Self {
        Self::new(rule, true, details)
    }

    pub fn failed(rule: &str, details: impl Into<String>) -> Self {
        Self::new(rule, false, details)
    }
}

/// The response handed back to the caller.
///
/// Field names follow the submission service's JSON contract, hence the
/// mixed casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub overall_pass: bool,
    pub score: f64,
    pub findings: Vec<Finding>,
    #[serde(rename = "policyName")]
    pub policy_name: String,
    #[serde(rename = "policyVersion")]
    pub policy_version: String,
    #[serde(rename = "checkedAt", serialize_with = "serialize_rfc3339")]
    pub checked_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn finding(&self, rule: &str) -> Option<&Finding> {
        self.findings.iter().find(|f| f.rule == rule)
    }
}

fn serialize_rfc3339<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

// ===== REQUESTS =====

/// An uploaded document plus the policy it should be checked against.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub bytes: Vec<u8>,
    /// Media type reported by the uploader, e.g. `application/pdf`.
    pub media_type: Option<String>,
    pub filename: String,
    pub policy_name: String,
    /// Informational; the stored policy's own version wins when present.
    pub policy_version: String,
}

impl CheckRequest {
    pub fn new(bytes: Vec<u8>, filename: &str, policy_name: &str, policy_version: &str) -> Self {
        Self {
            bytes,
            media_type: None,
            filename: filename.to_string(),
            policy_name: policy_name.to_string(),
            policy_version: policy_version.to_string(),
        }
    }

    pub fn with_media_type(mut self, media_type: &str) -> Self {
        self.media_type = Some(media_type.to_string());
        self
    }
}

// ===== DOCUMENT FORMATS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Word processing document (`.docx`), evaluated structurally
    Docx,
    /// Fixed-layout document (`.pdf`), evaluated from extracted text
    Pdf,
}

impl DocumentFormat {
    /// Detect the container format from the upload's media type, falling back
    /// to the filename extension when the media type is generic or absent.
    pub fn detect(media_type: Option<&str>, filename: &str) -> Option<Self> {
        let media_type = media_type.unwrap_or("application/octet-stream").to_ascii_lowercase();
        if media_type.contains("wordprocessingml") {
            return Some(DocumentFormat::Docx);
        }
        if media_type.contains("pdf") {
            return Some(DocumentFormat::Pdf);
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("docx") => Some(DocumentFormat::Docx),
            Some("pdf") => Some(DocumentFormat::Pdf),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Docx => write!(f, "docx"),
            DocumentFormat::Pdf => write!(f, "pdf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_prefers_specific_media_type() {
        let mime = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
        assert_eq!(DocumentFormat::detect(Some(mime), "upload.bin"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::detect(Some("application/pdf"), "upload"), Some(DocumentFormat::Pdf));
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            DocumentFormat::detect(Some("application/octet-stream"), "Thesis.DOCX"),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(DocumentFormat::detect(None, "report.pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::detect(Some("application/octet-stream"), "notes.odt"), None);
        assert_eq!(DocumentFormat::detect(None, "no_extension"), None);
    }

    #[test]
    fn test_result_serializes_contract_field_names() {
        let result = EvaluationResult {
            overall_pass: false,
            score: 0.5,
            findings: vec![Finding::failed(rules::MARGINS, "1\" on all sides")],
            policy_name: "thesis".to_string(),
            policy_version: "v1.0".to_string(),
            checked_at: Utc::now(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["policyName"].is_string());
        assert!(json["policyVersion"].is_string());
        assert!(json["checkedAt"].as_str().unwrap().ends_with('Z'));
        assert_eq!(json["findings"][0]["rule"], "margins");
        assert_eq!(json["findings"][0]["pass"], false);
    }
}
