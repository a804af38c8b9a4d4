// All checking logic is in formatcheck-core
// This CLI acts as a thin wrapper around the core library

// CLI-specific modules
pub mod telemetry;

// Re-export core types for convenience
pub use formatcheck_core::*;
