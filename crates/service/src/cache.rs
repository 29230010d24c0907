//! Layered key/value cache.
//!
//! Fast layer: in-memory map with a capacity bound (oldest entry evicted
//! first) and an optional TTL.
//! Durable layer: optional byte store, written through on insert and
//! promoted into the fast layer on a hit.

use async_trait::async_trait;
use codeindex_core::{CacheSettings, IndexError, Result};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Byte store backing the fast layer. Location and format of the stored
/// bytes are up to the implementation.
#[async_trait]
pub trait DurableLayer: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

fn storage_error(err: impl std::fmt::Display) -> IndexError {
    IndexError::Storage(err.to_string())
}

/// sled tree used as a durable layer; one database can host several trees.
#[derive(Clone)]
pub struct SledLayer {
    tree: sled::Tree,
}

impl SledLayer {
    pub fn open_db<P: AsRef<Path>>(path: P) -> Result<sled::Db> {
        sled::Config::new()
            .path(path.as_ref())
            .cache_capacity(64 * 1024 * 1024)
            .flush_every_ms(Some(1000))
            .open()
            .map_err(storage_error)
    }

    pub fn open<P: AsRef<Path>>(path: P, tree: &str) -> Result<Self> {
        let db = Self::open_db(path)?;
        Self::from_db(&db, tree)
    }

    pub fn from_db(db: &sled::Db, tree: &str) -> Result<Self> {
        let tree = db.open_tree(tree).map_err(storage_error)?;
        Ok(Self { tree })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> sled::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(storage_error)?
        .map_err(storage_error)
}

#[async_trait]
impl DurableLayer for SledLayer {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let tree = self.tree.clone();
        let key = key.to_string();
        blocking(move || Ok(tree.get(key.as_bytes())?.map(|value| value.to_vec()))).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let tree = self.tree.clone();
        let key = key.to_string();
        blocking(move || {
            tree.insert(key.as_bytes(), value)?;
            tree.flush()?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let tree = self.tree.clone();
        let key = key.to_string();
        blocking(move || {
            tree.remove(key.as_bytes())?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        let tree = self.tree.clone();
        blocking(move || {
            tree.clear()?;
            tree.flush()?;
            Ok(())
        })
        .await
    }
}

/// In-process durable layer, mostly useful in tests and as a shared second
/// level between cache managers.
#[derive(Default)]
pub struct MemoryLayer {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DurableLayer for MemoryLayer {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).map(|value| value.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheStats {
    pub fast_hits: u64,
    pub fast_misses: u64,
    pub durable_hits: u64,
    pub durable_misses: u64,
    pub evictions: u64,
    pub durable_errors: u64,
}

impl CacheStats {
    pub fn fast_hit_rate(&self) -> f64 {
        let total = self.fast_hits + self.fast_misses;
        if total == 0 {
            0.0
        } else {
            self.fast_hits as f64 / total as f64
        }
    }

    pub fn overall_hit_rate(&self) -> f64 {
        let requests = self.fast_hits + self.fast_misses;
        if requests == 0 {
            0.0
        } else {
            (self.fast_hits + self.durable_hits) as f64 / requests as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    fast_hits: AtomicU64,
    fast_misses: AtomicU64,
    durable_hits: AtomicU64,
    durable_misses: AtomicU64,
    evictions: AtomicU64,
    durable_errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            fast_hits: self.fast_hits.load(Ordering::Relaxed),
            fast_misses: self.fast_misses.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            durable_misses: self.durable_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            durable_errors: self.durable_errors.load(Ordering::Relaxed),
        }
    }
}

struct FastEntry<V> {
    value: V,
    inserted: Instant,
    sequence: u64,
}

pub struct CacheManager<V> {
    fast: DashMap<String, FastEntry<V>>,
    capacity: AtomicUsize,
    ttl: Option<Duration>,
    durable: Option<Arc<dyn DurableLayer>>,
    sequence: AtomicU64,
    counters: Counters,
}

impl<V> CacheManager<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            fast: DashMap::new(),
            capacity: AtomicUsize::new(capacity.max(1)),
            ttl,
            durable: None,
            sequence: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.fast_capacity, settings.fast_ttl())
    }

    pub fn with_durable(mut self, layer: Arc<dyn DurableLayer>) -> Self {
        self.durable = Some(layer);
        self
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Raise the fast-layer bound to at least `capacity`. Never lowers it.
    pub fn ensure_capacity(&self, capacity: usize) {
        let previous = self.capacity.fetch_max(capacity, Ordering::Relaxed);
        if previous < capacity {
            debug!(from = previous, to = capacity, "fast cache capacity raised");
        }
    }

    /// Fast layer first, then the durable layer. A durable read or decode
    /// failure is logged and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        if let Some(value) = self.get_fast(key) {
            Counters::bump(&self.counters.fast_hits);
            debug!(key, "fast cache hit");
            return Some(value);
        }
        Counters::bump(&self.counters.fast_misses);

        let durable = self.durable.as_ref()?;
        let bytes = match durable.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                Counters::bump(&self.counters.durable_misses);
                debug!(key, "cache miss");
                return None;
            }
            Err(err) => {
                Counters::bump(&self.counters.durable_errors);
                warn!(key, error = %err, "durable cache read failed; treating as miss");
                return None;
            }
        };

        match bincode::deserialize::<V>(&bytes) {
            Ok(value) => {
                Counters::bump(&self.counters.durable_hits);
                debug!(key, "durable cache hit; promoting");
                self.put_fast(key, value.clone());
                Some(value)
            }
            Err(err) => {
                Counters::bump(&self.counters.durable_errors);
                warn!(key, error = %err, "durable cache entry undecodable; treating as miss");
                None
            }
        }
    }

    /// Write through both layers. The fast layer is always updated, even
    /// when the durable write fails.
    pub async fn insert(&self, key: &str, value: V) -> Result<()> {
        let encoded = match &self.durable {
            Some(_) => Some(bincode::serialize(&value).map_err(storage_error)?),
            None => None,
        };
        self.put_fast(key, value);

        if let (Some(durable), Some(bytes)) = (&self.durable, encoded) {
            if let Err(err) = durable.put(key, bytes).await {
                Counters::bump(&self.counters.durable_errors);
                return Err(err);
            }
        }
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.fast.remove(key);
        if let Some(durable) = &self.durable {
            durable.remove(key).await?;
        }
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.fast.clear();
        if let Some(durable) = &self.durable {
            durable.clear().await?;
        }
        Ok(())
    }

    /// Entries currently held by the fast layer.
    pub fn len(&self) -> usize {
        self.fast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fast.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    fn get_fast(&self, key: &str) -> Option<V> {
        {
            let entry = self.fast.get(key)?;
            let fresh = self.ttl.map_or(true, |ttl| entry.inserted.elapsed() <= ttl);
            if fresh {
                return Some(entry.value.clone());
            }
        }
        self.fast.remove(key);
        debug!(key, "fast cache entry expired");
        None
    }

    fn put_fast(&self, key: &str, value: V) {
        if !self.fast.contains_key(key) && self.fast.len() >= self.capacity() {
            self.evict_oldest();
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.fast.insert(
            key.to_string(),
            FastEntry {
                value,
                inserted: Instant::now(),
                sequence,
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .fast
            .iter()
            .min_by_key(|entry| entry.value().sequence)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            self.fast.remove(&key);
            Counters::bump(&self.counters.evictions);
            debug!(key = %key, "evicted oldest fast cache entry");
        }
    }
}
