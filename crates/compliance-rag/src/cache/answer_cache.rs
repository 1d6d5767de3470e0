//! Answer caching with document-based invalidation
//!
//! Caches generated answers and drops them when a cited document changes
//! revision or the entry outlives its TTL.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Trim and collapse internal whitespace, keeping the original casing
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic cache key
///
/// Derived from the lowercased normalized query, `k`, the threshold and the
/// index revision, so any new ingestion yields fresh keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(normalized_query: &str, k: usize, threshold: f32, index_revision: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized_query.to_lowercase().as_bytes());
        hasher.update([0x1f]);
        hasher.update((k as u64).to_le_bytes());
        hasher.update(threshold.to_bits().to_le_bytes());
        hasher.update(index_revision.to_le_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cached answer with the revisions it was computed against
///
/// Never mutated once stored; a newer answer for the same key replaces it.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_key: CacheKey,
    pub answer_text: String,
    /// Chunks that were placed in the prompt
    pub source_chunk_ids: Vec<Uuid>,
    /// Chunks the answer cites
    pub cited_chunk_ids: Vec<Uuid>,
    /// Revision of each source document when the answer was generated
    pub document_revisions: HashMap<Uuid, u64>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.created_at).to_std() {
            Ok(age) => age >= self.ttl,
            // clock went backwards; treat as fresh
            Err(_) => false,
        }
    }

    /// Whether every source document is still at the cached revision
    pub fn is_current<F>(&self, current_revision: F) -> bool
    where
        F: Fn(&Uuid) -> Option<u64>,
    {
        self.document_revisions
            .iter()
            .all(|(doc_id, revision)| current_revision(doc_id) == Some(*revision))
    }

    pub fn references_document(&self, document_id: &Uuid) -> bool {
        self.document_revisions.contains_key(document_id)
    }
}

#[derive(Default)]
struct CacheState {
    /// Cache entries keyed by cache key
    entries: HashMap<CacheKey, Arc<CacheEntry>>,
    /// Reverse index: document_id -> keys whose entries cite it
    doc_to_keys: HashMap<Uuid, HashSet<CacheKey>>,
}

impl CacheState {
    fn insert(&mut self, key: CacheKey, entry: Arc<CacheEntry>) {
        self.remove(&key);
        for doc_id in entry.document_revisions.keys() {
            self.doc_to_keys.entry(*doc_id).or_default().insert(key.clone());
        }
        self.entries.insert(key, entry);
    }

    /// Drop an entry and unlink it from the reverse index
    fn remove(&mut self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entry = self.entries.remove(key)?;
        for doc_id in entry.document_revisions.keys() {
            if let Some(keys) = self.doc_to_keys.get_mut(doc_id) {
                keys.remove(key);
                if keys.is_empty() {
                    self.doc_to_keys.remove(doc_id);
                }
            }
        }
        Some(entry)
    }
}

/// Answer cache with document-based invalidation
///
/// Entries and the reverse index share one lock, so an invalidation never
/// misses an entry that is being stored.
pub struct AnswerCache {
    state: RwLock<CacheState>,
    /// Maximum cache size
    max_entries: usize,
    /// TTL for new cache entries
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AnswerCache {
    /// Create a new answer cache
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            max_entries: max_entries.max(1),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// TTL applied to entries built by [`AnswerCache::entry`]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build an entry stamped with this cache's TTL
    pub fn entry(
        &self,
        cache_key: CacheKey,
        answer_text: String,
        source_chunk_ids: Vec<Uuid>,
        cited_chunk_ids: Vec<Uuid>,
        document_revisions: HashMap<Uuid, u64>,
    ) -> CacheEntry {
        CacheEntry {
            cache_key,
            answer_text,
            source_chunk_ids,
            cited_chunk_ids,
            document_revisions,
            created_at: Utc::now(),
            ttl: self.ttl,
        }
    }

    /// Get an entry if present and within its TTL
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entry = self.lookup(key);
        self.record(entry.is_some());
        entry
    }

    /// Get an entry only if it is fresh and all its documents are current
    pub fn get_current<F>(&self, key: &CacheKey, current_revision: F) -> Option<Arc<CacheEntry>>
    where
        F: Fn(&Uuid) -> Option<u64>,
    {
        let entry = self.lookup_current(key, current_revision);
        self.record(entry.is_some());
        entry
    }

    /// Like [`AnswerCache::get_current`] but leaves hit and miss counters alone
    pub fn peek_current<F>(&self, key: &CacheKey, current_revision: F) -> Option<Arc<CacheEntry>>
    where
        F: Fn(&Uuid) -> Option<u64>,
    {
        self.lookup_current(key, current_revision)
    }

    fn lookup_current<F>(&self, key: &CacheKey, current_revision: F) -> Option<Arc<CacheEntry>>
    where
        F: Fn(&Uuid) -> Option<u64>,
    {
        let entry = self.lookup(key)?;
        if !entry.is_current(current_revision) {
            tracing::debug!("Cache miss (document revision advanced): {}", key.short());
            self.remove_if_same(key, &entry);
            return None;
        }
        Some(entry)
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entry = self.state.read().entries.get(key).cloned()?;
        if entry.is_expired(Utc::now()) {
            tracing::debug!("Cache miss (TTL expired): {}", key.short());
            self.remove_if_same(key, &entry);
            return None;
        }
        tracing::debug!("Cache hit: {}", key.short());
        Some(entry)
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Store an entry, replacing any previous one under the same key
    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        let mut state = self.state.write();

        // Evict oldest entry if at capacity
        if state.entries.len() >= self.max_entries && !state.entries.contains_key(&key) {
            if let Some(oldest_key) = state
                .entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                state.remove(&oldest_key);
            }
        }
        state.insert(key.clone(), Arc::new(entry));

        tracing::debug!("Cached answer: {}", key.short());
    }

    /// Invalidate all cache entries that reference a document
    ///
    /// Called when a document is re-ingested or on forced eviction.
    pub fn invalidate_by_document(&self, doc_id: &Uuid) -> usize {
        let mut state = self.state.write();
        let keys: Vec<CacheKey> = state
            .doc_to_keys
            .get(doc_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();

        let invalidated = keys.iter().filter(|key| state.remove(key).is_some()).count();
        drop(state);

        if invalidated > 0 {
            tracing::info!("Invalidated {} cached answers for document {}", invalidated, doc_id);
        }

        invalidated
    }

    fn remove_if_same(&self, key: &CacheKey, entry: &Arc<CacheEntry>) {
        let mut state = self.state.write();
        if state.entries.get(key).is_some_and(|current| Arc::ptr_eq(current, entry)) {
            state.remove(key);
        }
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.doc_to_keys.clear();
        tracing::info!("Answer cache cleared");
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached keys that cite a document
    pub fn keys_for_document(&self, doc_id: &Uuid) -> usize {
        self.state.read().doc_to_keys.get(doc_id).map_or(0, HashSet::len)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            max_entries: self.max_entries,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub max_entries: usize,
    pub ttl_seconds: u64,
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(3600)) // 1000 entries, 1 hour TTL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_for(cache: &AnswerCache, key: &CacheKey, doc_id: Uuid, revision: u64) -> CacheEntry {
        let chunk_id = Uuid::new_v4();
        cache.entry(
            key.clone(),
            "Tramadol is listed under Schedule H1.".to_string(),
            vec![chunk_id],
            vec![chunk_id],
            HashMap::from([(doc_id, revision)]),
        )
    }

    #[test]
    fn test_key_normalization() {
        let a = CacheKey::new(&normalize_query("  Is   Tramadol\tcontrolled? "), 5, 0.35, 7);
        let b = CacheKey::new(&normalize_query("is tramadol controlled?"), 5, 0.35, 7);
        assert_eq!(a, b);

        assert_ne!(a, CacheKey::new("is tramadol controlled?", 6, 0.35, 7));
        assert_ne!(a, CacheKey::new("is tramadol controlled?", 5, 0.3, 7));
        assert_ne!(a, CacheKey::new("is tramadol controlled?", 5, 0.35, 8));
    }

    #[test]
    fn test_normalize_keeps_case() {
        assert_eq!(normalize_query("  Is\n Tramadol  controlled? "), "Is Tramadol controlled?");
    }

    #[test]
    fn test_cache_hit() {
        let cache = AnswerCache::new(10, Duration::from_secs(3600));
        let doc_id = Uuid::new_v4();
        let key = CacheKey::new("what is the policy?", 5, 0.35, 1);

        cache.put(key.clone(), entry_for(&cache, &key, doc_id, 1));

        let hit = cache.get_current(&key, |_| Some(1)).unwrap();
        assert_eq!(hit.answer_text, "Tramadol is listed under Schedule H1.");
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_revision_advance_is_a_miss() {
        let cache = AnswerCache::new(10, Duration::from_secs(3600));
        let doc_id = Uuid::new_v4();
        let key = CacheKey::new("what is the policy?", 5, 0.35, 1);
        cache.put(key.clone(), entry_for(&cache, &key, doc_id, 1));

        assert!(cache.get_current(&key, |_| Some(2)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_invalidation() {
        let cache = AnswerCache::new(10, Duration::from_secs(3600));
        let doc_id = Uuid::new_v4();
        let other_doc = Uuid::new_v4();
        let key = CacheKey::new("what is the policy?", 5, 0.35, 1);
        let other_key = CacheKey::new("what is banned?", 5, 0.35, 1);

        cache.put(key.clone(), entry_for(&cache, &key, doc_id, 1));
        cache.put(other_key.clone(), entry_for(&cache, &other_key, other_doc, 1));

        assert_eq!(cache.invalidate_by_document(&doc_id), 1);
        assert!(cache.get(&key).is_none());
        assert!(cache.get(&other_key).is_some());
        assert_eq!(cache.invalidate_by_document(&doc_id), 0);
    }

    #[test]
    fn test_overwritten_entry_survives_invalidation_of_old_document() {
        let cache = AnswerCache::new(10, Duration::from_secs(3600));
        let old_doc = Uuid::new_v4();
        let new_doc = Uuid::new_v4();
        let key = CacheKey::new("what is the policy?", 5, 0.35, 1);

        cache.put(key.clone(), entry_for(&cache, &key, old_doc, 1));
        cache.put(key.clone(), entry_for(&cache, &key, new_doc, 1));

        assert_eq!(cache.invalidate_by_document(&old_doc), 0);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = AnswerCache::new(10, Duration::from_millis(20));
        let key = CacheKey::new("what is the policy?", 5, 0.35, 1);
        cache.put(key.clone(), entry_for(&cache, &key, Uuid::new_v4(), 1));
        assert!(cache.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_at_capacity() {
        let cache = AnswerCache::new(2, Duration::from_secs(3600));
        let keys: Vec<CacheKey> = (0..3)
            .map(|i| CacheKey::new(&format!("question {}", i), 5, 0.35, 1))
            .collect();
        for key in &keys {
            cache.put(key.clone(), entry_for(&cache, key, Uuid::new_v4(), 1));
            std::thread::sleep(Duration::from_millis(2));
        }

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[2]).is_some());
    }

    #[test]
    fn test_reverse_index_follows_removals() {
        let cache = AnswerCache::new(1, Duration::from_secs(3600));
        let doc_id = Uuid::new_v4();
        for revision in 0..1000 {
            let key = CacheKey::new("is tramadol controlled?", 5, 0.35, revision);
            cache.put(key.clone(), entry_for(&cache, &key, doc_id, 1));
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys_for_document(&doc_id), 1);

        // revision miss unlinks the key
        let key = CacheKey::new("is tramadol controlled?", 5, 0.35, 999);
        assert!(cache.get_current(&key, |_| Some(2)).is_none());
        assert_eq!(cache.keys_for_document(&doc_id), 0);
    }

    #[test]
    fn test_expired_entry_leaves_reverse_index() {
        let cache = AnswerCache::new(10, Duration::from_millis(10));
        let doc_id = Uuid::new_v4();
        let key = CacheKey::new("what is the policy?", 5, 0.35, 1);
        cache.put(key.clone(), entry_for(&cache, &key, doc_id, 1));

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.keys_for_document(&doc_id), 0);
    }

    #[test]
    fn test_invalidation_racing_puts_leaves_nothing_behind() {
        let cache = Arc::new(AnswerCache::new(10_000, Duration::from_secs(3600)));
        let doc_id = Uuid::new_v4();

        let writers: Vec<_> = (0..4u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..500u64 {
                        let key = CacheKey::new("is tramadol controlled?", 5, 0.35, t * 1000 + i);
                        cache.put(key.clone(), entry_for(&cache, &key, doc_id, 1));
                    }
                })
            })
            .collect();
        let invalidator = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    cache.invalidate_by_document(&doc_id);
                }
            })
        };
        for writer in writers {
            writer.join().unwrap();
        }
        invalidator.join().unwrap();

        // every surviving entry is reachable through the reverse index
        assert_eq!(cache.keys_for_document(&doc_id), cache.len());
        cache.invalidate_by_document(&doc_id);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_peek_does_not_count() {
        let cache = AnswerCache::new(10, Duration::from_secs(3600));
        let key = CacheKey::new("what is the policy?", 5, 0.35, 1);
        assert!(cache.peek_current(&key, |_| Some(1)).is_none());
        cache.put(key.clone(), entry_for(&cache, &key, Uuid::new_v4(), 1));
        assert!(cache.peek_current(&key, |_| Some(1)).is_some());

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
    }
}
