//! Content-addressed result cache. Bounded LRU, TTL checked on read, and
//! an optional JSON snapshot so results survive process restarts. A
//! corrupt or version-mismatched snapshot is treated as a cold cache,
//! never as a failure.

use crate::core::ScanResult;
use crate::error::CacheCorruption;
use crate::fingerprint::Fingerprint;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct CacheEntry {
    result: Arc<ScanResult>,
    expires_at: DateTime<Utc>,
}

struct CacheInner {
    entries: LruCache<Fingerprint, CacheEntry>,
    hits: u64,
    misses: u64,
}

pub struct ScanCache {
    inner: Mutex<CacheInner>,
}

impl ScanCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// In-memory only. For tests and one-shot runs.
    pub fn ephemeral() -> Self {
        Self::new(64)
    }

    /// Loads from a snapshot file. A missing, unreadable or corrupt
    /// snapshot yields an empty cache.
    pub fn load(path: &Path, capacity: usize) -> Self {
        let cache = Self::new(capacity);
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache snapshot, starting cold");
                return cache;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cache snapshot unreadable, starting cold");
                return cache;
            }
        };
        if let Err(corruption) = cache.absorb_snapshot(&content) {
            warn!(path = %path.display(), error = %corruption, "cache snapshot rejected, starting cold");
        }
        cache
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<ScanResult>> {
        let inner = &mut *self.inner.lock();
        let expired = match inner.entries.get(fingerprint) {
            Some(entry) if Utc::now() < entry.expires_at => {
                inner.hits += 1;
                debug!(fingerprint = fingerprint.short(), "cache hit");
                return Some(Arc::clone(&entry.result));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.pop(fingerprint);
            debug!(fingerprint = fingerprint.short(), "cache entry expired");
        }
        inner.misses += 1;
        None
    }

    /// A non-positive TTL disables storage entirely, which forces a miss
    /// on every later lookup.
    pub fn put(&self, fingerprint: Fingerprint, result: Arc<ScanResult>, ttl: Duration) {
        if ttl <= Duration::zero() {
            debug!("zero ttl, result not cached");
            return;
        }
        let inner = &mut *self.inner.lock();
        inner.entries.put(
            fingerprint,
            CacheEntry {
                result,
                expires_at: Utc::now() + ttl,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
        }
    }

    fn absorb_snapshot(&self, content: &str) -> Result<(), CacheCorruption> {
        let snapshot: Snapshot = serde_json::from_str(content)
            .map_err(|e| CacheCorruption(format!("snapshot is not valid JSON: {e}")))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheCorruption(format!(
                "snapshot version {} does not match {SNAPSHOT_VERSION}",
                snapshot.version
            )));
        }

        let now = Utc::now();
        let inner = &mut *self.inner.lock();
        let mut dropped = 0usize;
        // Entries serialize most recent first; inserting in reverse
        // restores LRU recency.
        for value in snapshot.entries.into_iter().rev() {
            match serde_json::from_value::<SnapshotEntry>(value) {
                Ok(entry) if entry.expires_at > now => {
                    let fingerprint = entry.result.unit.fingerprint.clone();
                    inner.entries.put(
                        fingerprint,
                        CacheEntry {
                            result: Arc::new(entry.result),
                            expires_at: entry.expires_at,
                        },
                    );
                }
                Ok(_) => {}
                Err(_) => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(dropped, "dropped undecodable snapshot entries");
        }
        Ok(())
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let now = Utc::now();
        let entries: Vec<serde_json::Value> = {
            let inner = self.inner.lock();
            inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.expires_at > now)
                .map(|(_, entry)| {
                    serde_json::to_value(SnapshotEntryRef {
                        expires_at: entry.expires_at,
                        result: &entry.result,
                    })
                })
                .collect::<Result<_, _>>()?
        };
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            entries,
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("writing cache snapshot {}", path.display()))?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct SnapshotEntry {
    expires_at: DateTime<Utc>,
    result: ScanResult,
}

#[derive(Serialize)]
struct SnapshotEntryRef<'a> {
    expires_at: DateTime<Utc>,
    result: &'a ScanResult,
}
