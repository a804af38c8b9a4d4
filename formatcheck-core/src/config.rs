use crate::error::{CheckError, ConfigError};
use crate::types::rules;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

// Default value functions for serde
fn default_font() -> String {
    "Times New Roman".to_string()
}

fn default_font_size() -> f64 {
    12.0
}

fn default_line_spacing() -> f64 {
    1.5
}

fn default_tolerance() -> f64 {
    0.1
}

fn default_pass_threshold() -> f64 {
    0.9
}

/// Version reported for policies that could not be read.
pub const PLACEHOLDER_VERSION: &str = "v1.0";

/// Weights applied when a policy doesn't carry its own table.
pub static DEFAULT_WEIGHTS: LazyLock<BTreeMap<String, f64>> = LazyLock::new(|| {
    [
        (rules::MARGINS, 1.0),
        (rules::FONT_FAMILY, 1.0),
        (rules::FONT_SIZE, 1.0),
        (rules::LINE_SPACING, 1.0),
        (rules::HEADING_NUMBERING, 1.0),
        (rules::IEEE_REFERENCES_BLOCK, 1.0),
        (rules::REQUIRED_HEADINGS, 1.0),
        (rules::TITLE_PAGE_KEYWORDS, 1.0),
        (rules::PAGE_COUNT_RANGE, 0.5),
    ]
    .into_iter()
    .map(|(rule, weight)| (rule.to_string(), weight))
    .collect()
});

/// Formatting policy for one document type.
///
/// Immutable once loaded; evaluation only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Informational version string
    #[serde(default)]
    pub version: Option<String>,
    /// Required font family
    #[serde(default = "default_font")]
    pub font: String,
    /// Target font size in points
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    /// Target line spacing multiplier (1.5 = one-and-a-half lines)
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f64,
    /// Share of paragraphs (0.0-1.0) allowed to miss a per-paragraph target
    #[serde(default = "default_tolerance", alias = "tolerance")]
    pub max_nonconforming_paragraph_ratio: f64,
    /// Section titles that must appear somewhere in the document
    #[serde(default)]
    pub required_headings: Vec<String>,
    /// Strings expected on the title page
    #[serde(default)]
    pub title_page_keywords: Vec<String>,
    /// Inclusive page-count bounds, written as `[min, max]`
    #[serde(default)]
    pub page_count_range: Option<PageCountRange>,
    /// Rule weights; rules missing from the table weigh 1.0
    #[serde(default)]
    pub weights: Option<BTreeMap<String, f64>>,
    /// Minimum score (0.0-1.0) for an overall pass
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct PageCountRange {
    pub min: u32,
    pub max: u32,
}

impl PageCountRange {
    pub fn contains(&self, pages: u32) -> bool {
        self.min <= pages && pages <= self.max
    }
}

impl From<(u32, u32)> for PageCountRange {
    fn from((min, max): (u32, u32)) -> Self {
        Self { min, max }
    }
}

impl From<PageCountRange> for (u32, u32) {
    fn from(range: PageCountRange) -> Self {
        (range.min, range.max)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            version: None,
            font: default_font(),
            font_size: default_font_size(),
            line_spacing: default_line_spacing(),
            max_nonconforming_paragraph_ratio: default_tolerance(),
            required_headings: Vec::new(),
            title_page_keywords: Vec::new(),
            page_count_range: None,
            weights: None,
            pass_threshold: default_pass_threshold(),
        }
    }
}

impl Policy {
    /// Minimal policy standing in for one that is missing or malformed.
    pub fn placeholder(version: &str) -> Self {
        Self {
            version: Some(version.to_string()),
            ..Self::default()
        }
    }

    /// Load a policy file. `.yaml`/`.yml` are read as YAML, anything else as JSON.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading policy {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let policy = match extension.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("parsing YAML policy {}", path.display()))?,
            _ => serde_json::from_str(&content)
                .with_context(|| format!("parsing JSON policy {}", path.display()))?,
        };
        Ok(policy)
    }

    /// Load a policy, degrading to the placeholder if the file can't be used.
    pub fn load_with_fallback(path: &Path) -> Self {
        Self::load_from_file(path).unwrap_or_else(|err| {
            let reason = format!("{err:#}");
            tracing::warn!(policy = %path.display(), error = %reason, "malformed policy, using placeholder");
            Self::placeholder(PLACEHOLDER_VERSION)
        })
    }

    /// Weight table used for scoring: the policy's own, or the default table.
    pub fn effective_weights(&self) -> &BTreeMap<String, f64> {
        self.weights.as_ref().unwrap_or(&DEFAULT_WEIGHTS)
    }

    /// Stored version if present, else the version the caller asked for.
    pub fn resolve_version<'a>(&'a self, requested: &'a str) -> &'a str {
        match self.version.as_deref() {
            Some(version) if !version.trim().is_empty() => version,
            _ => requested,
        }
    }
}

/// The closed set of document types a submission can be checked as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyName {
    Synopsis,
    Proposal,
    ProgressReport1,
    ProgressReport2,
    Thesis,
    JournalArticle,
}

impl PolicyName {
    pub const ALL: [PolicyName; 6] = [
        PolicyName::Synopsis,
        PolicyName::Proposal,
        PolicyName::ProgressReport1,
        PolicyName::ProgressReport2,
        PolicyName::Thesis,
        PolicyName::JournalArticle,
    ];

    /// Storage key, identical to the policy file's stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyName::Synopsis => "synopsis",
            PolicyName::Proposal => "proposal",
            PolicyName::ProgressReport1 => "progress_report_1",
            PolicyName::ProgressReport2 => "progress_report_2",
            PolicyName::Thesis => "thesis",
            PolicyName::JournalArticle => "journal_article",
        }
    }

    /// Map a submission workflow stage to the policy its uploads are checked against.
    pub fn from_stage_key(stage_key: &str) -> Option<Self> {
        match stage_key {
            "thesis_report" => Some(PolicyName::Thesis),
            "thesis" => None,
            other => other.parse().ok(),
        }
    }
}

impl FromStr for PolicyName {
    type Err = CheckError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        PolicyName::ALL
            .into_iter()
            .find(|name| name.as_str() == normalized)
            .ok_or_else(|| CheckError::UnsupportedPolicy(value.trim().to_string()))
    }
}

impl fmt::Display for PolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-level settings, read from the environment.
#[derive(Debug, Clone)]
pub struct CheckerSettings {
    pub policy_dir: PathBuf,
    pub cache_ttl: Duration,
    pub log_level: String,
}

impl CheckerSettings {
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, ConfigError> {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let policy_dir = resolve_policy_dir(env::var("POLICY_DIR").ok().as_deref(), &cwd);

        let cache_ttl = match env::var("POLICY_CACHE_TTL_SECONDS") {
            Ok(value) => parse_ttl(&value)?,
            Err(_) => Duration::from_secs(Self::DEFAULT_CACHE_TTL_SECS),
        };

        let log_level = env::var("FORMATCHECK_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            policy_dir,
            cache_ttl,
            log_level,
        })
    }
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            policy_dir: PathBuf::from("policies"),
            cache_ttl: Duration::from_secs(Self::DEFAULT_CACHE_TTL_SECS),
            log_level: "info".to_string(),
        }
    }
}

pub fn parse_ttl(value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|source| ConfigError::InvalidCacheTtl {
            value: value.to_string(),
            source,
        })
}

/// Pick the policy directory: explicit setting first, then the usual
/// deployment locations, then the per-user config directory.
pub fn resolve_policy_dir(explicit: Option<&str>, cwd: &Path) -> PathBuf {
    if let Some(dir) = explicit.filter(|dir| !dir.trim().is_empty()) {
        return PathBuf::from(dir);
    }

    let mut candidates = vec![
        cwd.join("app").join("policies").join("msc"),
        cwd.join("policies"),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("formatcheck").join("policies"));
    }

    candidates
        .into_iter()
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| cwd.join("policies"))
}
