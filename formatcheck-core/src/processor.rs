use crate::cache::PolicyCache;
use crate::config::{CheckerSettings, Policy, PolicyName};
use crate::error::CheckError;
use crate::extractors::Capabilities;
use crate::rules::{Evaluator, FlattenedTextEvaluator, StructuredEvaluator};
use crate::scoring;
use crate::storage::{calculate_document_hash, DirectoryStorage};
use crate::types::*;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

/// Checks uploaded documents against named formatting policies.
///
/// Owns the evaluators and shares the policy cache; concurrent checks touch
/// no other state.
pub struct FormatChecker {
    policies: Arc<PolicyCache>,
    structured: Box<dyn Evaluator>,
    flattened: Box<dyn Evaluator>,
}

impl FormatChecker {
    /// Create a checker with the default evaluator for each format
    pub fn new(policies: Arc<PolicyCache>) -> Self {
        Self::new_with_evaluators(
            policies,
            Box::new(StructuredEvaluator::new()),
            Box::new(FlattenedTextEvaluator::default()),
        )
    }

    /// Create a checker with full dependency injection
    pub fn new_with_evaluators(
        policies: Arc<PolicyCache>,
        structured: Box<dyn Evaluator>,
        flattened: Box<dyn Evaluator>,
    ) -> Self {
        Self {
            policies,
            structured,
            flattened,
        }
    }

    /// Convenience constructor reading policies from a directory
    pub fn from_settings(settings: &CheckerSettings) -> Self {
        let storage = DirectoryStorage::new(&settings.policy_dir);
        let cache = PolicyCache::new(Box::new(storage), settings.cache_ttl);
        Self::new(Arc::new(cache))
    }

    pub fn policy_cache(&self) -> &Arc<PolicyCache> {
        &self.policies
    }

    /// Formats the configured evaluators can actually read
    pub fn capabilities(&self) -> Capabilities {
        let mut capabilities = Capabilities { docx: false, pdf: false };
        for evaluator in [self.structured.as_ref(), self.flattened.as_ref()] {
            let available = evaluator.is_available();
            match evaluator.format() {
                DocumentFormat::Docx => capabilities.docx |= available,
                DocumentFormat::Pdf => capabilities.pdf |= available,
            }
        }
        capabilities
    }

    /// Startup check. Strict mode refuses to run without every format;
    /// otherwise missing formats are logged and their checks yield no findings.
    pub fn validate_capabilities(&self, strict: bool) -> Result<Capabilities, CheckError> {
        let capabilities = self.capabilities();
        for format in capabilities.missing() {
            if strict {
                return Err(CheckError::MissingCapability(format));
            }
            tracing::warn!(%format, "format support not compiled in; its checks will yield no findings");
        }
        Ok(capabilities)
    }

    fn evaluator_for(&self, format: DocumentFormat) -> &dyn Evaluator {
        match format {
            DocumentFormat::Docx => self.structured.as_ref(),
            DocumentFormat::Pdf => self.flattened.as_ref(),
        }
    }

    /// Check one uploaded document.
    ///
    /// Only an unsupported policy name is an error; every problem with the
    /// document itself shows up in the findings.
    pub fn check(&self, request: &CheckRequest) -> Result<EvaluationResult, CheckError> {
        let started = Instant::now();
        let policy_name: PolicyName = request.policy_name.parse()?;

        let snapshot = self.policies.get_now();
        let placeholder;
        let policy = match snapshot.get(policy_name.as_str()) {
            Some(policy) => policy,
            None => {
                tracing::debug!(policy = %policy_name, "no stored policy, using placeholder");
                placeholder = Policy::placeholder(&request.policy_version);
                &placeholder
            }
        };
        let policy_version = policy.resolve_version(&request.policy_version).to_string();

        let format = DocumentFormat::detect(request.media_type.as_deref(), &request.filename);
        let findings = match format {
            Some(format) => {
                let evaluator = self.evaluator_for(format);
                tracing::debug!(evaluator = evaluator.name(), %format, "evaluating");
                evaluator.evaluate(&request.bytes, policy)
            }
            None => vec![Finding::failed(rules::FILE_TYPE, "Unsupported type")],
        };

        let outcome = scoring::evaluate(&findings, policy);
        let result = EvaluationResult {
            overall_pass: outcome.overall_pass,
            score: outcome.reported_score(),
            findings,
            policy_name: policy_name.to_string(),
            policy_version,
            checked_at: Utc::now(),
        };

        let format_label = format.map_or_else(|| "unsupported".to_string(), |f| f.to_string());
        let document_hash = calculate_document_hash(&request.bytes);
        tracing::info!(
            policy = %result.policy_name,
            version = %result.policy_version,
            format = %format_label,
            document = %&document_hash[..12],
            findings = result.findings.len(),
            score = result.score,
            pass = result.overall_pass,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "document checked"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::collections::BTreeMap;
    use std::time::Duration;

    struct FixedEvaluator {
        format: DocumentFormat,
        findings: Vec<Finding>,
        available: bool,
    }

    impl Evaluator for FixedEvaluator {
        fn evaluate(&self, _bytes: &[u8], _policy: &Policy) -> Vec<Finding> {
            self.findings.clone()
        }

        fn format(&self) -> DocumentFormat {
            self.format
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn cache(policies: BTreeMap<String, Policy>) -> Arc<PolicyCache> {
        Arc::new(PolicyCache::new(
            Box::new(MemoryStorage::new(policies)),
            Duration::from_secs(60),
        ))
    }

    fn checker(policies: BTreeMap<String, Policy>, pdf_available: bool) -> FormatChecker {
        FormatChecker::new_with_evaluators(
            cache(policies),
            Box::new(FixedEvaluator {
                format: DocumentFormat::Docx,
                findings: vec![Finding::passed(rules::MARGINS, "ok"), Finding::passed(rules::FONT_SIZE, "ok")],
                available: true,
            }),
            Box::new(FixedEvaluator {
                format: DocumentFormat::Pdf,
                findings: vec![Finding::failed(rules::MARGINS, "PDF heuristic")],
                available: pdf_available,
            }),
        )
    }

    #[test]
    fn test_unsupported_policy_rejected() {
        let checker = checker(BTreeMap::new(), true);
        let request = CheckRequest::new(b"PK".to_vec(), "thesis.docx", "dissertation", "v1");
        assert!(matches!(checker.check(&request), Err(CheckError::UnsupportedPolicy(_))));
    }

    #[test]
    fn test_routes_by_format_and_scores() {
        let checker = checker(BTreeMap::new(), true);

        let docx = checker
            .check(&CheckRequest::new(Vec::new(), "thesis.docx", "Thesis", "v2"))
            .unwrap();
        assert_eq!(docx.score, 1.0);
        assert!(docx.overall_pass);
        assert_eq!(docx.policy_name, "thesis");

        let pdf = checker
            .check(&CheckRequest::new(Vec::new(), "upload", "thesis", "v2").with_media_type("application/pdf"))
            .unwrap();
        assert_eq!(pdf.score, 0.0);
        assert!(!pdf.overall_pass);
    }

    #[test]
    fn test_missing_policy_uses_placeholder_with_requested_version() {
        let checker = checker(BTreeMap::new(), true);
        let result = checker
            .check(&CheckRequest::new(Vec::new(), "a.docx", "proposal", "v7"))
            .unwrap();
        assert_eq!(result.policy_version, "v7");
    }

    #[test]
    fn test_stored_version_wins() {
        let stored = BTreeMap::from([("proposal".to_string(), Policy::placeholder("v3.2"))]);
        let checker = checker(stored, true);
        let result = checker
            .check(&CheckRequest::new(Vec::new(), "a.docx", "proposal", "v7"))
            .unwrap();
        assert_eq!(result.policy_version, "v3.2");
    }

    #[test]
    fn test_unrecognized_container_gets_file_type_finding() {
        let checker = checker(BTreeMap::new(), true);
        let request = CheckRequest::new(b"hello".to_vec(), "notes.odt", "synopsis", "v1")
            .with_media_type("application/octet-stream");
        let result = checker.check(&request).unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].rule, rules::FILE_TYPE);
        assert!(!result.findings[0].pass);
        assert_eq!(result.score, 0.0);
        assert!(!result.overall_pass);

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""score":0.0"#), "{json}");
    }

    #[test]
    fn test_validate_capabilities() {
        let checker = checker(BTreeMap::new(), false);
        assert!(matches!(
            checker.validate_capabilities(true),
            Err(CheckError::MissingCapability(DocumentFormat::Pdf))
        ));
        let caps = checker.validate_capabilities(false).unwrap();
        assert!(caps.docx);
        assert!(!caps.pdf);
    }
}
