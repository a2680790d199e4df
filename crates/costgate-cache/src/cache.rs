// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid exact + semantic response cache with TTL and LRU eviction.
//!
//! Entries live in sharded concurrent maps so lookups and inserts for
//! unrelated keys never contend. Both maps are only changed while holding the
//! key's slot in the exact map, so they always agree on the entry for a key.
//! Every write goes through to the [`CacheStore`] when one is attached; store
//! faults are logged and ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use costgate_config::model::CacheConfig;
use costgate_core::{CacheKey, Clock, EmbeddingAdapter, Request};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::{CacheStore, StoredEntry, StoredMetrics};
use crate::vector::cosine_similarity;

/// Tunables taken from the `[cache]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub ttl: chrono::Duration,
    pub max_entries: usize,
    pub similarity_threshold: f64,
    pub semantic_enabled: bool,
    /// Opportunistic eviction runs on one insert in this many.
    pub evict_sample_rate: u32,
}

impl From<&CacheConfig> for CacheSettings {
    fn from(config: &CacheConfig) -> Self {
        Self {
            ttl: chrono::Duration::days(i64::from(config.ttl_days)),
            max_entries: config.max_entries,
            similarity_threshold: config.semantic_similarity_threshold,
            semantic_enabled: config.semantic_enabled,
            evict_sample_rate: config.evict_sample_rate,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::from(&CacheConfig::default())
    }
}

/// A cached response.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub request_text: String,
    pub response_text: String,
    pub backend_id: String,
    /// Backend class the caching request was pinned to.
    pub backend_class: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    /// Latency of the backend call that produced this entry.
    pub latency_ms: u64,
    /// Insertion order, breaks LRU ties.
    seq: u64,
    /// Last access as Unix milliseconds.
    last_access_ms: AtomicI64,
}

impl CacheEntry {
    pub fn last_access(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.last_access_ms.load(Ordering::Relaxed))
            .single()
            .unwrap_or(self.created_at)
    }

    fn touch(&self, now: DateTime<Utc>) {
        self.last_access_ms
            .fetch_max(now.timestamp_millis(), Ordering::Relaxed);
    }

    fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.created_at > ttl
    }

    fn size_bytes(&self) -> u64 {
        (self.request_text.len()
            + self.response_text.len()
            + self.embedding.as_ref().map_or(0, |e| e.len() * 4)) as u64
    }

    fn to_stored(&self) -> StoredEntry {
        StoredEntry {
            key: self.key.clone(),
            request_text: self.request_text.clone(),
            response_text: self.response_text.clone(),
            backend_id: self.backend_id.clone(),
            backend_class: self.backend_class.clone(),
            embedding: self.embedding.clone(),
            created_at: self.created_at,
            last_access_at: self.last_access(),
            latency_ms: self.latency_ms,
        }
    }
}

/// How a lookup was answered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum CacheHit {
    Exact,
    Semantic { similarity: f64 },
    Miss,
}

/// Result of [`HybridCache::lookup`].
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub hit: CacheHit,
    pub entry: Option<Arc<CacheEntry>>,
}

impl CacheLookup {
    fn miss() -> Self {
        Self {
            hit: CacheHit::Miss,
            entry: None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.entry.is_some()
    }
}

/// What an eviction pass removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    pub expired: usize,
    pub lru: usize,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub semantic_entries: usize,
    pub bytes: u64,
    pub exact_hits: u64,
    pub semantic_hits: u64,
    pub misses: u64,
    pub time_saved_ms: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.exact_hits + self.semantic_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    exact_hits: AtomicU64,
    semantic_hits: AtomicU64,
    misses: AtomicU64,
    time_saved_ms: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> StoredMetrics {
        StoredMetrics {
            exact_hits: self.exact_hits.load(Ordering::Relaxed),
            semantic_hits: self.semantic_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            time_saved_ms: self.time_saved_ms.load(Ordering::Relaxed),
        }
    }
}

/// Exact and semantic response cache.
pub struct HybridCache {
    exact: DashMap<CacheKey, Arc<CacheEntry>>,
    /// Subset of `exact` whose entries carry an embedding.
    semantic: DashMap<CacheKey, Arc<CacheEntry>>,
    settings: CacheSettings,
    clock: Arc<dyn Clock>,
    embedder: Option<Arc<dyn EmbeddingAdapter>>,
    store: Option<CacheStore>,
    /// Held from an index change until its store write lands, so the store
    /// applies upserts and deletes in index order.
    write_order: Mutex<()>,
    seq: AtomicU64,
    bytes: AtomicU64,
    counters: Counters,
}

impl HybridCache {
    /// An in-memory cache with no persistence.
    pub fn new(settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            exact: DashMap::new(),
            semantic: DashMap::new(),
            settings,
            clock,
            embedder: None,
            store: None,
            write_order: Mutex::new(()),
            seq: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    /// A cache backed by `store`, warmed with its live entries and counters.
    ///
    /// A store that cannot be read yields an empty cache that still writes through.
    pub async fn open(store: CacheStore, settings: CacheSettings, clock: Arc<dyn Clock>) -> Self {
        let mut cache = Self::new(settings, clock);

        match store.load_metrics().await {
            Ok(m) => {
                cache.counters.exact_hits.store(m.exact_hits, Ordering::Relaxed);
                cache.counters.semantic_hits.store(m.semantic_hits, Ordering::Relaxed);
                cache.counters.misses.store(m.misses, Ordering::Relaxed);
                cache.counters.time_saved_ms.store(m.time_saved_ms, Ordering::Relaxed);
            }
            Err(e) => warn!(error = %e, "failed to load cache metrics, starting from zero"),
        }

        let now = cache.clock.now();
        match store.load_entries().await {
            Ok(entries) => {
                let mut skipped = 0usize;
                for stored in entries {
                    if now - stored.created_at > cache.settings.ttl {
                        skipped += 1;
                        continue;
                    }
                    let last_access = stored.last_access_at;
                    let entry = cache.new_entry(stored);
                    entry.touch(last_access);
                    cache.index(Arc::new(entry));
                }
                info!(
                    entries = cache.exact.len(),
                    expired_skipped = skipped,
                    "cache warmed from store"
                );
            }
            Err(e) => warn!(error = %e, "failed to load cache entries, starting empty"),
        }

        cache.store = Some(store);
        cache
    }

    /// Enable semantic matching with `embedder`.
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    fn new_entry(&self, stored: StoredEntry) -> CacheEntry {
        CacheEntry {
            key: stored.key,
            request_text: stored.request_text,
            response_text: stored.response_text,
            backend_id: stored.backend_id,
            backend_class: stored.backend_class,
            embedding: stored.embedding,
            created_at: stored.created_at,
            latency_ms: stored.latency_ms,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            last_access_ms: AtomicI64::new(stored.created_at.timestamp_millis()),
        }
    }

    /// Put an entry in the maps, replacing any entry for its key.
    ///
    /// The exact slot stays locked while `semantic` is updated; the lock
    /// order is always `exact` then `semantic`.
    fn index(&self, entry: Arc<CacheEntry>) {
        let added = entry.size_bytes();
        let slot = self.exact.entry(entry.key.clone());
        if entry.embedding.is_some() {
            self.semantic.insert(entry.key.clone(), Arc::clone(&entry));
        } else {
            self.semantic.remove(&entry.key);
        }
        match slot {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(entry);
                self.bytes.fetch_sub(previous.size_bytes(), Ordering::Relaxed);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
        self.bytes.fetch_add(added, Ordering::Relaxed);
    }

    /// Remove `entry` unless a newer entry already replaced it.
    fn unindex(&self, entry: &CacheEntry) -> bool {
        let Entry::Occupied(occupied) = self.exact.entry(entry.key.clone()) else {
            return false;
        };
        if occupied.get().seq != entry.seq {
            return false;
        }
        self.semantic.remove(&entry.key);
        occupied.remove();
        self.bytes.fetch_sub(entry.size_bytes(), Ordering::Relaxed);
        true
    }

    async fn persist_delete(&self, keys: Vec<CacheKey>) {
        if let Some(store) = &self.store
            && let Err(e) = store.delete(keys).await
        {
            warn!(error = %e, "cache store delete failed");
        }
    }

    /// Find a cached response for `request`.
    ///
    /// Tries the exact key first, then (when enabled) the most similar
    /// non-expired semantic entry at or above the similarity threshold that
    /// was cached under the same backend class.
    pub async fn lookup(&self, request: &Request) -> CacheLookup {
        let now = self.clock.now();
        let key = request.cache_key();

        let exact = self.exact.get(key).map(|e| Arc::clone(e.value()));
        if let Some(entry) = exact {
            if !entry.is_expired(now, self.settings.ttl) {
                self.record_hit(&entry, now).await;
                self.counters.exact_hits.fetch_add(1, Ordering::Relaxed);
                debug!(cache_key = %key, "exact cache hit");
                return CacheLookup {
                    hit: CacheHit::Exact,
                    entry: Some(entry),
                };
            }
            let _order = self.write_order.lock().await;
            if self.unindex(&entry) {
                debug!(cache_key = %key, "dropped expired entry");
                self.persist_delete(vec![entry.key.clone()]).await;
            }
        }

        if let Some((entry, similarity)) = self.semantic_match(request, now).await {
            self.record_hit(&entry, now).await;
            self.counters.semantic_hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache_key = %entry.key, similarity, "semantic cache hit");
            return CacheLookup {
                hit: CacheHit::Semantic { similarity },
                entry: Some(entry),
            };
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        CacheLookup::miss()
    }

    async fn semantic_match(
        &self,
        request: &Request,
        now: DateTime<Utc>,
    ) -> Option<(Arc<CacheEntry>, f64)> {
        if !self.settings.semantic_enabled || self.semantic.is_empty() {
            return None;
        }
        let embedder = self.embedder.as_ref()?;
        let query = match request.embedding(embedder.as_ref()).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "embedding failed, treating as cache miss");
                return None;
            }
        };

        let mut best: Option<(Arc<CacheEntry>, f64)> = None;
        for item in self.semantic.iter() {
            let entry = item.value();
            if entry.is_expired(now, self.settings.ttl)
                || entry.backend_class.as_deref() != request.backend_class()
            {
                continue;
            }
            let Some(embedding) = &entry.embedding else {
                continue;
            };
            let similarity = cosine_similarity(query, embedding);
            if similarity < self.settings.similarity_threshold {
                continue;
            }
            let better = match &best {
                None => true,
                Some((current, best_sim)) => {
                    similarity > *best_sim
                        || (similarity == *best_sim && entry.created_at > current.created_at)
                }
            };
            if better {
                best = Some((Arc::clone(entry), similarity));
            }
        }
        best
    }

    async fn record_hit(&self, entry: &CacheEntry, now: DateTime<Utc>) {
        entry.touch(now);
        self.counters
            .time_saved_ms
            .fetch_add(entry.latency_ms, Ordering::Relaxed);
        if let Some(store) = &self.store
            && let Err(e) = store.touch(&entry.key, now).await
        {
            warn!(error = %e, cache_key = %entry.key, "cache store touch failed");
        }
    }

    /// Cache a backend response for `request`. Last write wins per key.
    pub async fn insert(
        &self,
        request: &Request,
        response_text: &str,
        backend_id: &str,
        latency: Duration,
    ) {
        let embedding = self.embedding_for_insert(request).await;
        let now = self.clock.now();
        let entry = Arc::new(self.new_entry(StoredEntry {
            key: request.cache_key().clone(),
            request_text: request.text().to_string(),
            response_text: response_text.to_string(),
            backend_id: backend_id.to_string(),
            backend_class: request.backend_class().map(str::to_string),
            embedding,
            created_at: now,
            last_access_at: now,
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
        }));
        let stored = entry.to_stored();
        {
            let _order = self.write_order.lock().await;
            self.index(entry);
            debug!(cache_key = %request.cache_key(), backend_id, "cached response");

            if let Some(store) = &self.store
                && let Err(e) = store.upsert(stored).await
            {
                warn!(error = %e, cache_key = %request.cache_key(), "cache store write failed");
            }
        }

        let over_capacity = self.exact.len() > self.settings.max_entries;
        let sampled = self.settings.evict_sample_rate <= 1
            || rand::thread_rng().gen_ratio(1, self.settings.evict_sample_rate);
        if over_capacity || sampled {
            self.evict().await;
        }
    }

    async fn embedding_for_insert(&self, request: &Request) -> Option<Vec<f32>> {
        if !self.settings.semantic_enabled {
            return None;
        }
        let embedder = self.embedder.as_ref()?;
        match request.embedding(embedder.as_ref()).await {
            Ok(v) => Some(v.to_vec()),
            Err(e) => {
                warn!(error = %e, "embedding failed, caching exact entry only");
                None
            }
        }
    }

    /// Remove expired entries, then least-recently-used ones until the
    /// entry count is within `max_entries`. Flushes metrics afterwards.
    pub async fn evict(&self) -> EvictionReport {
        let order = self.write_order.lock().await;
        let now = self.clock.now();
        let mut report = EvictionReport::default();
        let mut removed_keys = Vec::new();

        let expired: Vec<Arc<CacheEntry>> = self
            .exact
            .iter()
            .filter(|e| e.value().is_expired(now, self.settings.ttl))
            .map(|e| Arc::clone(e.value()))
            .collect();
        for entry in expired {
            if self.unindex(&entry) {
                report.expired += 1;
                removed_keys.push(entry.key.clone());
            }
        }

        let excess = self.exact.len().saturating_sub(self.settings.max_entries);
        if excess > 0 {
            let mut by_age: Vec<Arc<CacheEntry>> =
                self.exact.iter().map(|e| Arc::clone(e.value())).collect();
            by_age.sort_by_key(|e| (e.last_access_ms.load(Ordering::Relaxed), e.seq));
            for entry in by_age {
                if self.exact.len() <= self.settings.max_entries {
                    break;
                }
                if self.unindex(&entry) {
                    report.lru += 1;
                    removed_keys.push(entry.key.clone());
                }
            }
        }

        if !removed_keys.is_empty() {
            debug!(expired = report.expired, lru = report.lru, "cache eviction");
            self.persist_delete(removed_keys).await;
        }
        drop(order);
        self.flush_metrics().await;
        report
    }

    /// Persist the hit/miss counters.
    pub async fn flush_metrics(&self) {
        if let Some(store) = &self.store
            && let Err(e) = store.save_metrics(self.counters.snapshot()).await
        {
            warn!(error = %e, "cache metrics flush failed");
        }
    }

    pub fn stats(&self) -> CacheStats {
        let m = self.counters.snapshot();
        CacheStats {
            entries: self.exact.len(),
            semantic_entries: self.semantic.len(),
            bytes: self.bytes.load(Ordering::Relaxed),
            exact_hits: m.exact_hits,
            semantic_hits: m.semantic_hits,
            misses: m.misses,
            time_saved_ms: m.time_saved_ms,
        }
    }
}
