// Forecast cache: the key/value store with TTL that sits between callers and the remote feed

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache rejected entry for {key}: {reason}")]
    Rejected { key: String, reason: String },
}

// Counters kept by the in-memory cache
#[derive(Debug, Default)]
pub struct CacheStats {
    pub size_bytes: AtomicUsize,
    pub items_count: AtomicUsize,
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub expired_count: AtomicUsize,
    pub rejected_count: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStatsReport {
    pub size_bytes: usize,
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub rejected_count: usize,
}

// Store consulted by the forecast service before going to the network.
//
// Values are opaque blobs. Implementations own expiry: an entry stored with
// a TTL must not be returned by `get` once the TTL has elapsed.
pub trait ForecastCache: Send + Sync + 'static {
    // Retrieve the blob stored under `key` if it exists and is not expired
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    // Store a blob under `key` for `ttl`, replacing any previous value
    fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;
}

// Key under which a feed path is cached, scoped by an opaque namespace
pub fn create_cache_key(namespace: &str, path: &str) -> String {
    format!("{}:{}", namespace, path)
}

pub fn calculate_item_size(key: &str, data: &[u8]) -> usize {
    key.len() + data.len() + std::mem::size_of::<CacheEntry>()
}

struct CacheEntry {
    data: Bytes,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }
}

// Process-local cache backed by a concurrent map. Expired entries are
// dropped lazily when read.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CacheEntry>,
    stats: CacheStats,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            size_bytes: self.stats.size_bytes.load(Ordering::SeqCst),
            items_count: self.stats.items_count.load(Ordering::SeqCst),
            hit_count: self.stats.hit_count.load(Ordering::SeqCst),
            miss_count: self.stats.miss_count.load(Ordering::SeqCst),
            expired_count: self.stats.expired_count.load(Ordering::SeqCst),
            rejected_count: self.stats.rejected_count.load(Ordering::SeqCst),
        }
    }

    // Only removes the entry if it is still expired, a concurrent put may have replaced it
    fn remove_expired(&self, key: &str) {
        if let Some((key, removed)) = self.entries.remove_if(key, |_, entry| entry.is_expired()) {
            self.stats
                .size_bytes
                .fetch_sub(calculate_item_size(&key, &removed.data), Ordering::SeqCst);
            self.stats.items_count.fetch_sub(1, Ordering::SeqCst);
            self.stats.expired_count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl ForecastCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.hit_count.fetch_add(1, Ordering::SeqCst);
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => true,
            None => false,
        };

        // Read guard is dropped by now, the shard can be write-locked
        if expired {
            debug!("Cache entry {} expired", key);
            self.remove_expired(key);
        }
        self.stats.miss_count.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    fn put(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            self.stats.rejected_count.fetch_add(1, Ordering::SeqCst);
            return Err(CacheError::Rejected {
                key: key.to_string(),
                reason: "ttl must be greater than zero".to_string(),
            });
        }

        let item_size = calculate_item_size(key, &value);
        let entry = CacheEntry {
            data: value,
            created_at: Instant::now(),
            ttl,
        };

        match self.entries.insert(key.to_string(), entry) {
            Some(previous) => {
                self.stats.size_bytes.fetch_sub(
                    calculate_item_size(key, &previous.data),
                    Ordering::SeqCst,
                );
            }
            None => {
                self.stats.items_count.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.stats.size_bytes.fetch_add(item_size, Ordering::SeqCst);

        debug!("Cached {} bytes under {} for {:?}", item_size, key, ttl);
        Ok(())
    }
}

// Cache that never holds anything; every lookup is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl ForecastCache for NoopCache {
    fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}
