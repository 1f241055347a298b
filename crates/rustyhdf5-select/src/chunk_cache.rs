//! Thread-safe chunk cache with slot and byte budgets and LRU eviction.
//!
//! The [`ChunkCache`] keeps decoded chunk buffers keyed by chunk grid
//! coordinates so repeated reads of the same chunk, within one decode or
//! across several, do not hit the reader again. Buffers are handed out as
//! [`Bytes`], so callers hold a cheap shared view that stays valid after
//! eviction.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Coordinate key for a chunk: its position in the chunk grid.
pub type ChunkKey = Vec<u64>;

/// Default maximum bytes of decoded chunk data to cache.
pub const DEFAULT_CACHE_BYTES: usize = 1024 * 1024; // 1 MiB

/// Default maximum number of cached chunks.
pub const DEFAULT_MAX_SLOTS: usize = 521;

/// Budgets of a [`ChunkCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCacheConfig {
    /// Maximum number of entries.
    pub max_slots: usize,
    /// Maximum total bytes, exceeded only by a single oversized entry.
    pub max_bytes: usize,
}

impl Default for ChunkCacheConfig {
    fn default() -> Self {
        Self {
            max_slots: DEFAULT_MAX_SLOTS,
            max_bytes: DEFAULT_CACHE_BYTES,
        }
    }
}

// ---------------------------------------------------------------------------
// LRU entry
// ---------------------------------------------------------------------------

struct CachedChunk {
    data: Bytes,
    /// Monotonically increasing access counter for LRU ordering.
    last_access: u64,
}

struct CacheInner {
    entries: HashMap<ChunkKey, CachedChunk>,
    /// `last_access` tick → key, oldest first.
    recency: BTreeMap<u64, ChunkKey>,
    current_bytes: usize,
    max_bytes: usize,
    max_slots: usize,
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &[u64]) -> Option<Bytes> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut entry.last_access, tick);
        let data = entry.data.clone();
        if let Some(k) = self.recency.remove(&previous) {
            self.recency.insert(tick, k);
        }
        Some(data)
    }

    fn evict_lru(&mut self) -> bool {
        let Some((_, key)) = self.recency.pop_first() else {
            return false;
        };
        if let Some(removed) = self.entries.remove(&key) {
            self.current_bytes -= removed.data.len();
            self.evictions += 1;
            debug!(
                chunk = ?key,
                bytes = removed.data.len(),
                slots = self.entries.len(),
                consumed_bytes = self.current_bytes,
                "evicted chunk"
            );
        }
        true
    }

    fn insert(&mut self, key: &[u64], data: Bytes) -> Bytes {
        // lost a race: keep the first buffer so budgets count it once
        if let Some(existing) = self.touch(key) {
            return existing;
        }

        let size = data.len();
        while self.entries.len() >= self.max_slots || self.current_bytes + size > self.max_bytes {
            if !self.evict_lru() {
                break;
            }
        }

        let tick = self.next_tick();
        self.current_bytes += size;
        self.recency.insert(tick, key.to_vec());
        self.entries.insert(
            key.to_vec(),
            CachedChunk {
                data: data.clone(),
                last_access: tick,
            },
        );
        data
    }
}

// ---------------------------------------------------------------------------
// ChunkCache
// ---------------------------------------------------------------------------

/// A chunk cache with LRU eviction, safe to share between threads.
///
/// The internal lock only guards bookkeeping. Factories run outside it, so
/// two callers racing on the same missing chunk may both produce it; the
/// first buffer admitted wins and is counted once.
///
/// ```
/// use bytes::Bytes;
/// use rustyhdf5_select::ChunkCache;
///
/// let cache = ChunkCache::with_capacity(1024, 4);
/// let a = cache
///     .get_or_create(&[0, 1], || Ok::<_, std::io::Error>(Bytes::from_static(b"abcd")))
///     .unwrap();
/// let b = cache
///     .get_or_create(&[0, 1], || -> Result<Bytes, std::io::Error> { unreachable!() })
///     .unwrap();
/// assert_eq!(a, b);
/// assert_eq!(cache.hits(), 1);
/// ```
pub struct ChunkCache {
    inner: Mutex<CacheInner>,
}

impl ChunkCache {
    /// Create a chunk cache with default limits (1 MiB, 521 slots).
    pub fn new() -> Self {
        Self::from_config(ChunkCacheConfig::default())
    }

    /// Create a chunk cache with a custom byte budget and slot count.
    pub fn with_capacity(max_bytes: usize, max_slots: usize) -> Self {
        Self::from_config(ChunkCacheConfig {
            max_slots,
            max_bytes,
        })
    }

    pub fn from_config(config: ChunkCacheConfig) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                recency: BTreeMap::new(),
                current_bytes: 0,
                max_bytes: config.max_bytes,
                max_slots: config.max_slots,
                tick: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// The budgets this cache was created with.
    pub fn config(&self) -> ChunkCacheConfig {
        let inner = self.inner.lock();
        ChunkCacheConfig {
            max_slots: inner.max_slots,
            max_bytes: inner.max_bytes,
        }
    }

    fn lookup(&self, key: &[u64]) -> Option<Bytes> {
        let mut inner = self.inner.lock();
        match inner.touch(key) {
            Some(data) => {
                inner.hits += 1;
                trace!(chunk = ?key, "chunk cache hit");
                Some(data)
            }
            None => {
                inner.misses += 1;
                trace!(chunk = ?key, "chunk cache miss");
                None
            }
        }
    }

    fn admit(&self, key: &[u64], data: Bytes) -> Bytes {
        self.inner.lock().insert(key, data)
    }

    /// Return the cached buffer for `key`, or build it with `factory` and
    /// admit it.
    ///
    /// Factory errors are returned unchanged and leave the cache untouched.
    pub fn get_or_create<E, F>(&self, key: &[u64], factory: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Result<Bytes, E>,
    {
        if let Some(data) = self.lookup(key) {
            return Ok(data);
        }
        let data = factory()?;
        Ok(self.admit(key, data))
    }

    /// Like [`get_or_create`](Self::get_or_create) with a future-returning
    /// factory. No lock is held while the future runs.
    pub async fn get_or_create_async<E, F, Fut>(&self, key: &[u64], factory: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, E>>,
    {
        if let Some(data) = self.lookup(key) {
            return Ok(data);
        }
        let data = factory().await?;
        Ok(self.admit(key, data))
    }

    /// Whether `key` is currently cached. Does not affect recency.
    pub fn contains(&self, key: &[u64]) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Drop every entry. Statistics are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
        inner.current_bytes = 0;
    }

    /// Number of chunks currently cached.
    pub fn consumed_slots(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Total bytes currently cached.
    pub fn consumed_bytes(&self) -> usize {
        self.inner.lock().current_bytes
    }

    pub fn hits(&self) -> u64 {
        self.inner.lock().hits
    }

    pub fn misses(&self) -> u64 {
        self.inner.lock().misses
    }

    pub fn evictions(&self) -> u64 {
        self.inner.lock().evictions
    }

    /// Cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        }
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ChunkCache")
            .field("slots", &inner.entries.len())
            .field("max_slots", &inner.max_slots)
            .field("bytes", &inner.current_bytes)
            .field("max_bytes", &inner.max_bytes)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
