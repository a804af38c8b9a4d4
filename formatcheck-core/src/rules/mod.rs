// Rule evaluation - one evaluator per document format
// - signals.rs: raw measurements and the formatting resolver chains
// - structured.rs: rules over a parsed .docx
// - flattened.rs: heuristics over text extracted from a .pdf

pub mod flattened;
pub mod signals;
pub mod structured;

pub use flattened::FlattenedTextEvaluator;
pub use structured::StructuredEvaluator;

use crate::config::{PageCountRange, Policy};
use crate::types::{rules, DocumentFormat, Finding};

/// Turns document bytes into findings for one container format.
///
/// Evaluators never fail: anything that cannot be measured degrades to fewer
/// or failing findings.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, bytes: &[u8], policy: &Policy) -> Vec<Finding>;

    fn format(&self) -> DocumentFormat;

    fn name(&self) -> &str;

    /// Whether the parsing support behind this evaluator is compiled in
    fn is_available(&self) -> bool;
}

/// Containment check shared by the required-headings and title-page rules
pub(crate) fn containment_finding(rule: &str, text: &str, required: &[String], scope: &str) -> Finding {
    let missing = signals::missing_phrases(text, required);
    if missing.is_empty() {
        Finding::passed(rule, format!("All {} found in {scope}", required.len()))
    } else {
        Finding::failed(rule, format!("Missing: {}", missing.join(", ")))
    }
}

pub(crate) fn page_count_finding(range: PageCountRange, pages: u32) -> Finding {
    Finding::new(
        rules::PAGE_COUNT_RANGE,
        range.contains(pages),
        format!("{pages} pages; allowed {}-{}", range.min, range.max),
    )
}

/// Supplementary rules, emitted only for what the policy asks about.
///
/// `page_count` is `None` when the document gives no trustworthy count, in
/// which case the page rule is skipped.
pub(crate) fn supplementary_findings(
    policy: &Policy,
    full_text: &str,
    title_page_text: &str,
    page_count: Option<u32>,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    if !policy.required_headings.is_empty() {
        findings.push(containment_finding(
            rules::REQUIRED_HEADINGS,
            full_text,
            &policy.required_headings,
            "document text",
        ));
    }
    if !policy.title_page_keywords.is_empty() {
        findings.push(containment_finding(
            rules::TITLE_PAGE_KEYWORDS,
            title_page_text,
            &policy.title_page_keywords,
            "title page",
        ));
    }
    if let (Some(range), Some(pages)) = (policy.page_count_range, page_count) {
        findings.push(page_count_finding(range, pages));
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment_details_name_missing_entries() {
        let required = vec!["Abstract".to_string(), "Conclusion".to_string()];
        let finding = containment_finding(rules::REQUIRED_HEADINGS, "ABSTRACT ... conclusion", &required, "text");
        assert!(finding.pass);

        let finding = containment_finding(rules::REQUIRED_HEADINGS, "Abstract only", &required, "text");
        assert!(!finding.pass);
        assert_eq!(finding.details, "Missing: Conclusion");
    }

    #[test]
    fn test_page_count_bounds_are_inclusive() {
        let range = PageCountRange { min: 40, max: 80 };
        assert!(!page_count_finding(range, 39).pass);
        assert!(page_count_finding(range, 40).pass);
        assert!(page_count_finding(range, 80).pass);
        assert!(!page_count_finding(range, 81).pass);
    }

    #[test]
    fn test_supplementary_rules_follow_policy() {
        assert!(supplementary_findings(&Policy::default(), "text", "text", Some(10)).is_empty());

        let policy = Policy {
            required_headings: vec!["Abstract".into()],
            title_page_keywords: vec!["University".into()],
            page_count_range: Some(PageCountRange { min: 1, max: 5 }),
            ..Policy::default()
        };
        let rules: Vec<String> = supplementary_findings(&policy, "abstract", "university", None)
            .into_iter()
            .map(|f| f.rule)
            .collect();
        assert_eq!(rules, vec!["required_headings", "title_page_keywords"]);
    }
}
