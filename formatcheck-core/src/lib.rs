// Formatcheck Core Library
//
// Checks academic submissions (.docx, .pdf) against named formatting policies.
// Main interface is FormatChecker: request in, scored findings out.

pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod processor;
pub mod rules;
pub mod scoring;
pub mod storage;
pub mod types;

// Re-export main types and functions for easy use
pub use types::*;
pub use cache::{PolicyCache, PolicySnapshot};
pub use config::{CheckerSettings, Policy, PolicyName};
pub use error::{CheckError, ConfigError};
pub use extractors::Capabilities;
pub use processor::FormatChecker;
pub use storage::{DirectoryStorage, MemoryStorage, PolicyStorage};
