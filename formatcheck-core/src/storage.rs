use crate::config::Policy;
use crate::error::CheckError;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Where policy definitions live. Each definition is keyed by its document type.
pub trait PolicyStorage: Send + Sync {
    /// Read every policy currently in storage.
    ///
    /// Individual malformed definitions come back as placeholders; only a
    /// storage location that exists but cannot be listed is an error.
    fn load_policies(&self) -> Result<BTreeMap<String, Policy>, CheckError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Directory of `<name>.json` / `<name>.yaml` policy files
pub struct DirectoryStorage {
    dir: PathBuf,
}

impl DirectoryStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn policy_key(path: &Path) -> Option<String> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        if !matches!(extension.as_str(), "json" | "yaml" | "yml") {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        Some(stem.to_ascii_lowercase())
    }
}

impl PolicyStorage for DirectoryStorage {
    fn load_policies(&self) -> Result<BTreeMap<String, Policy>, CheckError> {
        let mut policies = BTreeMap::new();
        if !self.dir.is_dir() {
            tracing::debug!(dir = %self.dir.display(), "policy directory missing, no policies known");
            return Ok(policies);
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| CheckError::Storage {
            path: self.dir.clone(),
            source,
        })?;

        // Sorted so `thesis.json` wins over `thesis.yaml` deterministically
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            if let Some(key) = Self::policy_key(&path) {
                policies
                    .entry(key)
                    .or_insert_with(|| Policy::load_with_fallback(&path));
            }
        }

        Ok(policies)
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }
}

/// In-process storage for embedding and tests
#[derive(Default)]
pub struct MemoryStorage {
    policies: RwLock<BTreeMap<String, Policy>>,
}

impl MemoryStorage {
    pub fn new(policies: BTreeMap<String, Policy>) -> Self {
        Self {
            policies: RwLock::new(policies),
        }
    }

    /// Replace the stored set; visible to the cache at its next refresh.
    pub fn replace(&self, policies: BTreeMap<String, Policy>) {
        match self.policies.write() {
            Ok(mut guard) => *guard = policies,
            Err(poisoned) => *poisoned.into_inner() = policies,
        }
    }
}

impl PolicyStorage for MemoryStorage {
    fn load_policies(&self) -> Result<BTreeMap<String, Policy>, CheckError> {
        let guard = match self.policies.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(guard.clone())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Fast fingerprint for an uploaded document using start + end chunks
pub fn calculate_document_hash(bytes: &[u8]) -> String {
    let chunk_size = 1024; // 1KB from start and end
    let mut hasher = Sha256::new();

    hasher.update(bytes.len().to_le_bytes());

    let start_end = std::cmp::min(chunk_size, bytes.len());
    hasher.update(&bytes[0..start_end]);

    if bytes.len() > chunk_size {
        let end_start = bytes.len() - chunk_size;
        hasher.update(&bytes[end_start..]);
    }

    format!("{:x}", hasher.finalize())
}

/// Fingerprint identifying one generation of loaded policies
pub fn calculate_policies_fingerprint(policies: &BTreeMap<String, Policy>) -> String {
    let mut hasher = Sha256::new();
    // BTreeMap serializes in key order, so the JSON is canonical
    match serde_json::to_vec(policies) {
        Ok(json) => hasher.update(&json),
        Err(_) => hasher.update(b"unserializable"),
    }
    format!("{:x}", hasher.finalize())
}
