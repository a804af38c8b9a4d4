use crate::types::DocumentFormat;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the checker.
///
/// Everything that goes wrong while reading a document is recovered inside the
/// evaluators; only genuinely unsupported requests reach this type.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("unsupported_policy: '{0}' is not a known document type")]
    UnsupportedPolicy(String),

    #[error("no {0} parser compiled into this build")]
    MissingCapability(DocumentFormat),

    #[error("failed to read policy storage at {path}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid process configuration (environment values).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid POLICY_CACHE_TTL_SECONDS '{value}': expected a whole number of seconds")]
    InvalidCacheTtl {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}
