// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for cache entries and hit/miss counters.
//!
//! The in-memory index is authoritative while the process runs; this store
//! lets entries and metrics survive a restart.

use chrono::{DateTime, SecondsFormat, Utc};
use costgate_core::{CacheKey, CostgateError};
use costgate_storage::{Database, map_tr_err};
use tracing::warn;

use crate::vector::{blob_to_vec, vec_to_blob};

/// One cache entry as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub key: CacheKey,
    pub request_text: String,
    pub response_text: String,
    pub backend_id: String,
    /// Backend class the caching request was pinned to.
    pub backend_class: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
    pub latency_ms: u64,
}

/// Persisted counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredMetrics {
    pub exact_hits: u64,
    pub semantic_hits: u64,
    pub misses: u64,
    pub time_saved_ms: u64,
}

/// Row as read, before timestamp parsing.
struct RawRow {
    key: String,
    request_text: String,
    response_text: String,
    backend_id: String,
    backend_class: Option<String>,
    created_at: String,
    last_access_at: String,
    latency_ms: i64,
    embedding: Option<Vec<u8>>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Cache tables in a migrated [`Database`].
#[derive(Clone)]
pub struct CacheStore {
    db: Database,
}

impl CacheStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Every persisted entry, oldest first. Rows with unreadable timestamps are skipped.
    pub async fn load_entries(&self) -> Result<Vec<StoredEntry>, CostgateError> {
        let rows = self
            .db
            .connection()
            .call(|conn| -> Result<Vec<RawRow>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.cache_key, e.request_text, e.response_text, e.backend_id, \
                     e.created_at, e.last_access_at, e.latency_ms, s.embedding, e.backend_class \
                     FROM cache_exact e LEFT JOIN cache_semantic s ON s.cache_key = e.cache_key \
                     ORDER BY e.created_at, e.rowid",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(RawRow {
                            key: row.get(0)?,
                            request_text: row.get(1)?,
                            response_text: row.get(2)?,
                            backend_id: row.get(3)?,
                            created_at: row.get(4)?,
                            last_access_at: row.get(5)?,
                            latency_ms: row.get(6)?,
                            embedding: row.get(7)?,
                            backend_class: row.get(8)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_tr_err)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let (Some(created_at), Some(last_access_at)) = (
                parse_timestamp(&row.created_at),
                parse_timestamp(&row.last_access_at),
            ) else {
                warn!(cache_key = %row.key, "skipping cache row with unreadable timestamp");
                continue;
            };
            entries.push(StoredEntry {
                key: CacheKey(row.key),
                request_text: row.request_text,
                response_text: row.response_text,
                backend_id: row.backend_id,
                backend_class: row.backend_class,
                embedding: row.embedding.as_deref().map(blob_to_vec),
                created_at,
                last_access_at,
                latency_ms: row.latency_ms.max(0) as u64,
            });
        }
        Ok(entries)
    }

    /// Write an entry, replacing any previous one for the key. An entry
    /// without an embedding removes the key's semantic row.
    pub async fn upsert(&self, entry: StoredEntry) -> Result<(), CostgateError> {
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                let created_at = timestamp(entry.created_at);
                let last_access_at = timestamp(entry.last_access_at);
                tx.execute(
                    "INSERT OR REPLACE INTO cache_exact (cache_key, request_text, response_text, \
                     backend_id, created_at, last_access_at, latency_ms, backend_class) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        entry.key.as_str(),
                        entry.request_text,
                        entry.response_text,
                        entry.backend_id,
                        created_at,
                        last_access_at,
                        entry.latency_ms as i64,
                        entry.backend_class,
                    ],
                )?;
                match &entry.embedding {
                    Some(embedding) => {
                        tx.execute(
                            "INSERT OR REPLACE INTO cache_semantic (cache_key, request_text, \
                             response_text, backend_id, embedding, created_at, last_access_at, \
                             backend_class) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                            rusqlite::params![
                                entry.key.as_str(),
                                entry.request_text,
                                entry.response_text,
                                entry.backend_id,
                                vec_to_blob(embedding),
                                created_at,
                                last_access_at,
                                entry.backend_class,
                            ],
                        )?;
                    }
                    None => {
                        tx.execute(
                            "DELETE FROM cache_semantic WHERE cache_key = ?1",
                            rusqlite::params![entry.key.as_str()],
                        )?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }

    /// Record a hit's access time.
    pub async fn touch(&self, key: &CacheKey, at: DateTime<Utc>) -> Result<(), CostgateError> {
        let key = key.0.clone();
        let at = timestamp(at);
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "UPDATE cache_exact SET last_access_at = ?2 WHERE cache_key = ?1",
                    rusqlite::params![key, at],
                )?;
                conn.execute(
                    "UPDATE cache_semantic SET last_access_at = ?2 WHERE cache_key = ?1",
                    rusqlite::params![key, at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// Delete entries from both tables.
    pub async fn delete(&self, keys: Vec<CacheKey>) -> Result<(), CostgateError> {
        if keys.is_empty() {
            return Ok(());
        }
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                let tx = conn.transaction()?;
                {
                    let mut exact = tx.prepare("DELETE FROM cache_exact WHERE cache_key = ?1")?;
                    let mut semantic =
                        tx.prepare("DELETE FROM cache_semantic WHERE cache_key = ?1")?;
                    for key in &keys {
                        exact.execute(rusqlite::params![key.as_str()])?;
                        semantic.execute(rusqlite::params![key.as_str()])?;
                    }
                }
                tx.commit()
            })
            .await
            .map_err(map_tr_err)
    }

    pub async fn load_metrics(&self) -> Result<StoredMetrics, CostgateError> {
        self.db
            .connection()
            .call(|conn| -> Result<StoredMetrics, rusqlite::Error> {
                conn.query_row(
                    "SELECT exact_hits, semantic_hits, misses, time_saved_ms \
                     FROM cache_metrics WHERE id = 1",
                    [],
                    |row| {
                        Ok(StoredMetrics {
                            exact_hits: row.get::<_, i64>(0)?.max(0) as u64,
                            semantic_hits: row.get::<_, i64>(1)?.max(0) as u64,
                            misses: row.get::<_, i64>(2)?.max(0) as u64,
                            time_saved_ms: row.get::<_, i64>(3)?.max(0) as u64,
                        })
                    },
                )
            })
            .await
            .map_err(map_tr_err)
    }

    /// Overwrite the persisted counters with absolute values.
    pub async fn save_metrics(&self, metrics: StoredMetrics) -> Result<(), CostgateError> {
        self.db
            .connection()
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO cache_metrics (id, exact_hits, semantic_hits, misses, time_saved_ms) \
                     VALUES (1, ?1, ?2, ?3, ?4) \
                     ON CONFLICT(id) DO UPDATE SET exact_hits = ?1, semantic_hits = ?2, \
                     misses = ?3, time_saved_ms = ?4",
                    rusqlite::params![
                        metrics.exact_hits as i64,
                        metrics.semantic_hits as i64,
                        metrics.misses as i64,
                        metrics.time_saved_ms as i64,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn entry(key: &str, embedding: Option<Vec<f32>>) -> StoredEntry {
        StoredEntry {
            key: CacheKey(key.to_string()),
            request_text: format!("request {key}"),
            response_text: format!("response {key}"),
            backend_id: "local-small".into(),
            backend_class: None,
            embedding,
            created_at: at("2026-03-01T10:00:00Z"),
            last_access_at: at("2026-03-01T10:00:00Z"),
            latency_ms: 420,
        }
    }

    async fn store() -> CacheStore {
        CacheStore::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn upsert_and_load() {
        let store = store().await;
        let mut pinned = entry("a", Some(vec![1.0, 0.0]));
        pinned.backend_class = Some("eu-large".into());
        store.upsert(pinned).await.unwrap();
        store.upsert(entry("b", None)).await.unwrap();

        let loaded = store.load_entries().await.unwrap();
        assert_eq!(loaded.len(), 2);
        let a = loaded.iter().find(|e| e.key.as_str() == "a").unwrap();
        assert_eq!(a.embedding.as_deref(), Some(&[1.0, 0.0][..]));
        assert_eq!(a.latency_ms, 420);
        assert_eq!(a.backend_class.as_deref(), Some("eu-large"));
        let b = loaded.iter().find(|e| e.key.as_str() == "b").unwrap();
        assert!(b.embedding.is_none());
        assert!(b.backend_class.is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_and_clears_embedding() {
        let store = store().await;
        store.upsert(entry("a", Some(vec![1.0]))).await.unwrap();
        let mut replacement = entry("a", None);
        replacement.response_text = "newer".into();
        store.upsert(replacement).await.unwrap();

        let loaded = store.load_entries().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].response_text, "newer");
        assert!(loaded[0].embedding.is_none());
    }

    #[tokio::test]
    async fn touch_and_delete() {
        let store = store().await;
        store.upsert(entry("a", Some(vec![1.0]))).await.unwrap();
        store.upsert(entry("b", None)).await.unwrap();
        store
            .touch(&CacheKey("a".into()), at("2026-03-02T00:00:00Z"))
            .await
            .unwrap();

        let loaded = store.load_entries().await.unwrap();
        let a = loaded.iter().find(|e| e.key.as_str() == "a").unwrap();
        assert_eq!(a.last_access_at, at("2026-03-02T00:00:00Z"));

        store.delete(vec![CacheKey("a".into())]).await.unwrap();
        let loaded = store.load_entries().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key.as_str(), "b");
    }

    #[tokio::test]
    async fn metrics_round_trip() {
        let store = store().await;
        assert_eq!(store.load_metrics().await.unwrap(), StoredMetrics::default());
        let m = StoredMetrics {
            exact_hits: 3,
            semantic_hits: 2,
            misses: 7,
            time_saved_ms: 1234,
        };
        store.save_metrics(m).await.unwrap();
        assert_eq!(store.load_metrics().await.unwrap(), m);
    }
}
