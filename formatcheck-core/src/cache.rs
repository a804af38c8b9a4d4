use crate::config::Policy;
use crate::storage::{calculate_policies_fingerprint, PolicyStorage};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// One generation of loaded policies. Never mutated; a refresh installs a new one.
#[derive(Debug, Clone)]
pub struct PolicySnapshot {
    pub policies: BTreeMap<String, Policy>,
    pub loaded_at: Instant,
    pub fingerprint: String,
}

impl PolicySnapshot {
    pub fn new(policies: BTreeMap<String, Policy>, loaded_at: Instant) -> Self {
        let fingerprint = calculate_policies_fingerprint(&policies);
        Self {
            policies,
            loaded_at,
            fingerprint,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.policies.keys().map(String::as_str).collect()
    }

    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.loaded_at) < ttl
    }
}

/// TTL cache in front of a [`PolicyStorage`].
///
/// Refresh is lazy and synchronous: the first `get` after expiry re-reads
/// storage on the calling thread. Readers hold an `Arc` to whichever snapshot
/// was current when they asked, so a refresh never exposes a partial mapping.
pub struct PolicyCache {
    storage: Box<dyn PolicyStorage>,
    ttl: Duration,
    current: RwLock<Option<Arc<PolicySnapshot>>>,
}

impl PolicyCache {
    pub fn new(storage: Box<dyn PolicyStorage>, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            current: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current snapshot as of `now`, reloading from storage if expired.
    pub fn get(&self, now: Instant) -> Arc<PolicySnapshot> {
        let previous = self.peek();
        if let Some(snapshot) = &previous {
            if snapshot.is_fresh(now, self.ttl) {
                return Arc::clone(snapshot);
            }
        }

        let policies = match self.storage.load_policies() {
            Ok(policies) => policies,
            Err(err) => {
                // Keep serving the last good generation rather than forgetting every policy
                tracing::warn!(storage = %self.storage.describe(), error = %err, "policy reload failed");
                previous
                    .as_ref()
                    .map(|snapshot| snapshot.policies.clone())
                    .unwrap_or_default()
            }
        };

        let snapshot = Arc::new(PolicySnapshot::new(policies, now));
        tracing::info!(
            storage = %self.storage.describe(),
            policies = snapshot.policies.len(),
            fingerprint = %&snapshot.fingerprint[..12],
            "policy cache refreshed"
        );

        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// Snapshot as of the wall clock
    pub fn get_now(&self) -> Arc<PolicySnapshot> {
        self.get(Instant::now())
    }

    /// Drop the current snapshot; the next `get` reloads.
    pub fn invalidate(&self) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }

    fn peek(&self) -> Option<Arc<PolicySnapshot>> {
        let guard = match self.current.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStorage {
        inner: MemoryStorage,
        loads: Arc<AtomicUsize>,
    }

    impl PolicyStorage for CountingStorage {
        fn load_policies(&self) -> Result<BTreeMap<String, Policy>, crate::error::CheckError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_policies()
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn policies(version: &str) -> BTreeMap<String, Policy> {
        BTreeMap::from([("thesis".to_string(), Policy::placeholder(version))])
    }

    fn counting_cache(ttl: Duration) -> (PolicyCache, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let storage = CountingStorage {
            inner: MemoryStorage::new(policies("v1")),
            loads: Arc::clone(&loads),
        };
        (PolicyCache::new(Box::new(storage), ttl), loads)
    }

    #[test]
    fn test_within_ttl_returns_same_snapshot() {
        let (cache, loads) = counting_cache(Duration::from_secs(60));
        let t0 = Instant::now();

        let first = cache.get(t0);
        let second = cache.get(t0 + Duration::from_secs(59));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_expiry_reloads_synchronously() {
        let (cache, loads) = counting_cache(Duration::from_secs(60));
        let t0 = Instant::now();

        let first = cache.get(t0);
        let second = cache.get(t0 + Duration::from_secs(60));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(second.fingerprint, first.fingerprint);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (cache, loads) = counting_cache(Duration::from_secs(3600));
        let t0 = Instant::now();
        cache.get(t0);
        cache.invalidate();
        cache.get(t0);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_readers_keep_old_generation_after_refresh() {
        let storage = Arc::new(MemoryStorage::new(policies("v1")));

        struct Shared(Arc<MemoryStorage>);
        impl PolicyStorage for Shared {
            fn load_policies(&self) -> Result<BTreeMap<String, Policy>, crate::error::CheckError> {
                self.0.load_policies()
            }
            fn describe(&self) -> String {
                "shared".to_string()
            }
        }

        let cache = PolicyCache::new(Box::new(Shared(Arc::clone(&storage))), Duration::from_secs(10));
        let t0 = Instant::now();
        let old = cache.get(t0);

        storage.replace(policies("v2"));
        let still_cached = cache.get(t0 + Duration::from_secs(5));
        assert_eq!(still_cached.get("thesis").unwrap().version.as_deref(), Some("v1"));

        let refreshed = cache.get(t0 + Duration::from_secs(11));
        assert_eq!(refreshed.get("thesis").unwrap().version.as_deref(), Some("v2"));
        assert_eq!(old.get("thesis").unwrap().version.as_deref(), Some("v1"));
        assert_ne!(old.fingerprint, refreshed.fingerprint);
    }
}
