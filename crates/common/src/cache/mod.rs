//! Long-context payload cache
//!
//! Provides:
//! - TTL-bounded entries keyed by corpus fingerprint and assembly settings
//! - Single-flight builds: concurrent misses on one key assemble once
//! - Flat-file persistence through a pluggable [`CacheStore`]

pub mod store;

pub use store::{CacheStore, JsonFileStore, MemoryStore};

use crate::config::CacheConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Persisted index: cache key to entry
pub type CacheIndex = BTreeMap<String, CacheEntry>;

/// An assembled long-context payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextPayload {
    /// Chunk blocks joined by blank lines
    pub text: String,

    /// Included chunks, in assembly order
    pub chunk_ids: Vec<String>,

    pub char_count: usize,

    pub token_count: usize,
}

impl ContextPayload {
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            chunk_ids: Vec::new(),
            char_count: 0,
            token_count: 0,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_ids.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: ContextPayload,
    pub created_at: DateTime<Utc>,
    pub ttl_minutes: u64,
}

impl CacheEntry {
    /// `None` when the TTL reaches past the representable range
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = i64::try_from(self.ttl_minutes).ok()?;
        self.created_at.checked_add_signed(ChronoDuration::try_minutes(ttl)?)
    }

    /// Entries are valid strictly before their expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now >= expires_at)
    }
}

/// Result of a cache lookup-or-build
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub payload: ContextPayload,
    /// False when this caller ran the builder
    pub hit: bool,
}

/// Long-context payload cache
pub struct ContextCache {
    config: CacheConfig,
    entries: Mutex<CacheIndex>,
    in_flight: Mutex<HashMap<String, Arc<OnceCell<ContextPayload>>>>,
    store: Arc<dyn CacheStore>,
    /// Serializes saves so the file always ends on the latest index
    persisting: Mutex<()>,
}

impl ContextCache {
    /// Create a cache backed by `store`, loading any persisted entries.
    ///
    /// An unreadable index is logged and treated as empty.
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        let now = Utc::now();
        let entries = match store.load_index() {
            Ok(mut index) => {
                index.retain(|_, entry| !entry.is_expired(now));
                index
            }
            Err(e) => {
                warn!(error = %e, "Context cache index unreadable, starting empty");
                CacheIndex::new()
            }
        };

        info!(
            enabled = config.enabled,
            ttl_minutes = config.ttl_minutes,
            min_chars = config.min_chars,
            entries = entries.len(),
            "Context cache ready"
        );

        Self {
            config,
            entries: Mutex::new(entries),
            in_flight: Mutex::new(HashMap::new()),
            store,
            persisting: Mutex::new(()),
        }
    }

    /// Build from configuration: a JSON file when `index_path` is set,
    /// otherwise memory only
    pub fn from_config(config: CacheConfig) -> Self {
        let store: Arc<dyn CacheStore> = match &config.index_path {
            Some(path) => Arc::new(JsonFileStore::new(path.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        Self::new(config, store)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Number of stored entries, expired ones included until pruned
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Valid payload for `key`, if any
    pub async fn get(&self, key: &str) -> Option<ContextPayload> {
        let now = Utc::now();
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.payload.clone())
    }

    /// Return the cached payload for `key`, or run `builder` to produce it.
    ///
    /// Concurrent callers missing on the same key share one build. A failed
    /// or cancelled build stores nothing; the next caller builds again.
    /// Payloads below `min_chars` are returned but never stored.
    pub async fn get_or_build<F, Fut>(&self, key: &str, builder: F) -> Result<CacheLookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ContextPayload>>,
    {
        if !self.config.enabled {
            let payload = builder().await?;
            return Ok(CacheLookup { payload, hit: false });
        }

        if let Some(payload) = self.get(key).await {
            debug!(key = %key, "Cache hit");
            metrics::record_cache(true, "context");
            return Ok(CacheLookup { payload, hit: true });
        }

        let cell = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let mut built = false;
        let outcome = cell
            .get_or_try_init(|| async {
                // A previous flight may have finished between the lookup and here
                if let Some(payload) = self.get(key).await {
                    return Ok(payload);
                }
                built = true;
                let payload = builder().await?;
                self.store_entry(key, &payload).await;
                Ok::<_, AppError>(payload)
            })
            .await
            .map(|payload| payload.clone());

        self.release(key, &cell).await;

        let payload = outcome?;
        debug!(key = %key, built, "Cache lookup resolved");
        metrics::record_cache(!built, "context");
        Ok(CacheLookup { payload, hit: !built })
    }

    async fn store_entry(&self, key: &str, payload: &ContextPayload) {
        if payload.char_count < self.config.min_chars || self.config.ttl_minutes == 0 {
            debug!(
                key = %key,
                chars = payload.char_count,
                min_chars = self.config.min_chars,
                "Payload not cached"
            );
            return;
        }

        let now = Utc::now();
        {
            let mut entries = self.entries.lock().await;
            entries.retain(|_, entry| !entry.is_expired(now));
            entries.insert(
                key.to_string(),
                CacheEntry {
                    payload: payload.clone(),
                    created_at: now,
                    ttl_minutes: self.config.ttl_minutes,
                },
            );
        }

        if let Err(e) = self.persist().await {
            warn!(error = %e, "Failed to persist context cache, continuing in memory");
        }
    }

    /// Write the current index on the blocking pool.
    ///
    /// Readers only wait for the copy, never for the write itself.
    async fn persist(&self) -> Result<()> {
        let _persisting = self.persisting.lock().await;
        let index = self.entries.lock().await.clone();
        let store = self.store.clone();

        tokio::task::spawn_blocking(move || store.save_index(&index))
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("cache save task failed: {}", e),
            })?
    }

    async fn release(&self, key: &str, cell: &Arc<OnceCell<ContextPayload>>) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(key).is_some_and(|current| Arc::ptr_eq(current, cell)) {
            in_flight.remove(key);
        }
    }
}

/// Cache key builder helpers
pub mod keys {
    use crate::config::{AssemblyStrategy, ContextBudget, ContextProfile};
    use crate::models::Mode;
    use sha2::{Digest, Sha256};

    /// Key for an assembled long-context payload.
    ///
    /// The question only participates when the strategy depends on it.
    pub fn context_payload(
        fingerprint: &str,
        mode: Mode,
        strategy: AssemblyStrategy,
        profile: ContextProfile,
        budget: ContextBudget,
        question: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        for part in [
            fingerprint,
            mode.as_str(),
            strategy.as_str(),
            profile.as_str(),
            &budget.max_chars.to_string(),
            &budget.max_tokens.to_string(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        if strategy == AssemblyStrategy::Relevance {
            hasher.update(question.trim().to_lowercase().as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssemblyStrategy, ContextBudget, ContextProfile};
    use crate::models::Mode;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn config(ttl_minutes: u64, min_chars: usize) -> CacheConfig {
        CacheConfig {
            enabled: true,
            ttl_minutes,
            min_chars,
            index_path: None,
        }
    }

    fn payload(chars: usize) -> ContextPayload {
        ContextPayload {
            text: "x".repeat(chars),
            chunk_ids: vec!["abc:0".into()],
            char_count: chars,
            token_count: chars / 4,
        }
    }

    /// Store whose saves block until the gate is released
    struct GatedStore {
        gate: Arc<std::sync::Mutex<()>>,
        saving: Arc<AtomicBool>,
    }

    impl CacheStore for GatedStore {
        fn load_index(&self) -> Result<CacheIndex> {
            Ok(CacheIndex::new())
        }

        fn save_index(&self, _index: &CacheIndex) -> Result<()> {
            self.saving.store(true, Ordering::SeqCst);
            let _open = self.gate.lock();
            Ok(())
        }
    }

    fn temp_index(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("navigator-{}-{}.json", name, unique_suffix()))
    }

    fn unique_suffix() -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{}-{}", std::process::id(), nanos)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = ContextCache::new(config(60, 10), Arc::new(MemoryStore::new()));

        let first = cache.get_or_build("k", || async { Ok(payload(50)) }).await.unwrap();
        assert!(!first.hit);

        let second = cache
            .get_or_build("k", || async {
                Err(AppError::Internal { message: "builder ran on a hit".into() })
            })
            .await
            .unwrap();
        assert!(second.hit);
        assert_eq!(second.payload, first.payload);
    }

    #[tokio::test]
    async fn test_zero_ttl_always_misses() {
        let cache = ContextCache::new(config(0, 0), Arc::new(MemoryStore::new()));
        let builds = AtomicUsize::new(0);

        for _ in 0..2 {
            let lookup = cache
                .get_or_build("k", || async {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(payload(500))
                })
                .await
                .unwrap();
            assert!(!lookup.hit);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_small_payload_not_stored() {
        let cache = ContextCache::new(config(60, 1000), Arc::new(MemoryStore::new()));
        cache.get_or_build("k", || async { Ok(payload(999)) }).await.unwrap();
        assert!(cache.is_empty().await);

        cache.get_or_build("k", || async { Ok(payload(1000)) }).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_builds() {
        let mut cfg = config(60, 0);
        cfg.enabled = false;
        let cache = ContextCache::new(cfg, Arc::new(MemoryStore::new()));

        for _ in 0..2 {
            let lookup = cache.get_or_build("k", || async { Ok(payload(10)) }).await.unwrap();
            assert!(!lookup.hit);
        }
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_misses_build_once() {
        let cache = Arc::new(ContextCache::new(config(60, 0), Arc::new(MemoryStore::new())));
        let builds = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let builds = builds.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_build("shared", || async move {
                            builds.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok(payload(100))
                        })
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        let misses = results
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .filter(|lookup| !lookup.hit)
            .count();
        assert_eq!(misses, 1);
    }

    #[tokio::test]
    async fn test_failed_build_stores_nothing() {
        let cache = ContextCache::new(config(60, 0), Arc::new(MemoryStore::new()));

        let err = cache
            .get_or_build("k", || async {
                Err(AppError::Internal { message: "boom".into() })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
        assert!(cache.is_empty().await);

        let retry = cache.get_or_build("k", || async { Ok(payload(20)) }).await.unwrap();
        assert!(!retry.hit);
    }

    #[tokio::test]
    async fn test_cancelled_build_stores_nothing() {
        let cache = ContextCache::new(config(60, 0), Arc::new(MemoryStore::new()));

        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            cache.get_or_build("k", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(payload(20))
            }),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(cache.is_empty().await);

        let next = cache.get_or_build("k", || async { Ok(payload(20)) }).await.unwrap();
        assert!(!next.hit);
    }

    #[tokio::test]
    async fn test_json_store_survives_restart() {
        let path = temp_index("restart");
        {
            let cache = ContextCache::new(config(60, 0), Arc::new(JsonFileStore::new(&path)));
            cache.get_or_build("k", || async { Ok(payload(30)) }).await.unwrap();
        }

        let reopened = ContextCache::new(config(60, 0), Arc::new(JsonFileStore::new(&path)));
        assert_eq!(reopened.get("k").await, Some(payload(30)));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reads_proceed_while_index_is_saved() {
        let gate = Arc::new(std::sync::Mutex::new(()));
        let saving = Arc::new(AtomicBool::new(false));
        let store = GatedStore {
            gate: gate.clone(),
            saving: saving.clone(),
        };
        let cache = Arc::new(ContextCache::new(config(60, 0), Arc::new(store)));

        let closed = gate.lock().unwrap();
        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_or_build("k", || async { Ok(payload(40)) }).await })
        };

        tokio::time::timeout(Duration::from_secs(5), async {
            while !saving.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let read = tokio::time::timeout(Duration::from_secs(1), cache.get("k")).await;
        assert_eq!(read.unwrap(), Some(payload(40)));

        drop(closed);
        assert!(!writer.await.unwrap().unwrap().hit);
    }

    #[tokio::test]
    async fn test_corrupt_index_is_empty_cache() {
        let path = temp_index("corrupt");
        std::fs::write(&path, "{not json").unwrap();

        let cache = ContextCache::new(config(60, 0), Arc::new(JsonFileStore::new(&path)));
        assert!(cache.is_empty().await);

        let lookup = cache.get_or_build("k", || async { Ok(payload(10)) }).await.unwrap();
        assert!(!lookup.hit);
        assert_eq!(cache.len().await, 1);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let created_at = Utc::now();
        let entry = CacheEntry {
            payload: payload(1),
            created_at,
            ttl_minutes: 5,
        };
        assert!(!entry.is_expired(created_at + ChronoDuration::minutes(4)));
        assert!(entry.is_expired(created_at + ChronoDuration::minutes(5)));
    }

    #[test]
    fn test_context_key_inputs() {
        let budget = ContextBudget { max_chars: 500_000, max_tokens: 120_000 };
        let key = |strategy, question| {
            keys::context_payload(
                "fp",
                Mode::LongContext,
                strategy,
                ContextProfile::Balanced,
                budget,
                question,
            )
        };

        assert_eq!(key(AssemblyStrategy::Sequential, "a?"), key(AssemblyStrategy::Sequential, "b?"));
        assert_ne!(key(AssemblyStrategy::Relevance, "a?"), key(AssemblyStrategy::Relevance, "b?"));
        assert_ne!(key(AssemblyStrategy::Sequential, "a?"), key(AssemblyStrategy::Relevance, "a?"));

        let stress = keys::context_payload(
            "fp",
            Mode::LongContext,
            AssemblyStrategy::Sequential,
            ContextProfile::Stress,
            budget,
            "a?",
        );
        assert_ne!(stress, key(AssemblyStrategy::Sequential, "a?"));
    }
}
