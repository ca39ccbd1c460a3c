//! Cache Layer - expiring key/value domains with hit/miss counters
//!
//! Each [`TtlCache`] is one independent TTL domain:
//! - entries expire lazily on read, and in bulk through [`TtlCache::purge_expired`]
//! - a full domain purges expired entries, then evicts the oldest insert
//! - backed by a sharded `DashMap`, so an entry is written under its
//!   shard's write lock and never observed half-written
//!
//! [`CacheLayer`] bundles the four domains the resolver reads and writes.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{Descriptor, EnrichmentRecord, IndexItem, RatingInfo, DEFAULT_MAX_ENTRIES};

/// A cached value and its expiry
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
    /// Insertion sequence, used to find the oldest entry
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Lookup counters and size of one domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

impl CacheStats {
    fn new(hits: u64, misses: u64, size: usize) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        Self {
            hits,
            misses,
            hit_rate,
            size,
        }
    }
}

/// One TTL domain
pub struct TtlCache<V> {
    name: &'static str,
    entries: DashMap<String, CacheEntry<V>>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    next_seq: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Bound the number of entries (0 means unbounded)
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value for `key` if present and unexpired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        // The shard read guard must be released before removing
        let lookup = self
            .entries
            .get(key)
            .map(|e| (!e.is_expired(now)).then(|| e.value.clone()));

        match lookup {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("cache hit: {}/{}", self.name, key);
                Some(value)
            }
            Some(None) => {
                self.entries.remove_if(key, |_, e| e.is_expired(now));
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("cache expired: {}/{}", self.name, key);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("cache miss: {}/{}", self.name, key);
                None
            }
        }
    }

    /// Store `value` with the domain TTL
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.insert_with_ttl(key, value, self.ttl);
    }

    /// Store `value` with an explicit TTL
    pub fn insert_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();

        if self.max_entries > 0
            && self.entries.len() >= self.max_entries
            && !self.entries.contains_key(&key)
        {
            self.make_room();
        }

        let entry = CacheEntry {
            value,
            expires_at: now + ttl,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };
        self.entries.insert(key, entry);
    }

    /// Purge expired entries, then evict oldest inserts until below the bound
    fn make_room(&self) {
        self.purge_expired();

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().seq)
                .map(|e| e.key().clone());

            match oldest {
                Some(key) => {
                    debug!("cache evict: {}/{}", self.name, key);
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry; counters are kept
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.entries.len(),
        )
    }
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("len", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

/// The four TTL domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheDomain {
    Descriptors,
    Searches,
    Records,
    Ratings,
}

impl CacheDomain {
    pub const ALL: [CacheDomain; 4] = [
        CacheDomain::Descriptors,
        CacheDomain::Searches,
        CacheDomain::Records,
        CacheDomain::Ratings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheDomain::Descriptors => "descriptors",
            CacheDomain::Searches => "searches",
            CacheDomain::Records => "records",
            CacheDomain::Ratings => "ratings",
        }
    }

    /// How often the sweeper purges this domain
    pub fn default_check_period(&self) -> Duration {
        match self {
            CacheDomain::Descriptors | CacheDomain::Ratings => Duration::from_secs(3600),
            CacheDomain::Searches | CacheDomain::Records => Duration::from_secs(600),
        }
    }
}

impl fmt::Display for CacheDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a clear operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    Domain(CacheDomain),
    /// Every domain; also resets counters
    All,
}

/// TTL per domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
    pub descriptors: Duration,
    pub searches: Duration,
    pub records: Duration,
    pub ratings: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            descriptors: Duration::from_secs(crate::DEFAULT_DESCRIPTOR_TTL_SECS),
            searches: Duration::from_secs(crate::DEFAULT_SEARCH_TTL_SECS),
            records: Duration::from_secs(crate::DEFAULT_RECORD_TTL_SECS),
            ratings: Duration::from_secs(crate::DEFAULT_RATING_TTL_SECS),
        }
    }
}

/// Stats for every domain plus the aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub descriptors: CacheStats,
    pub searches: CacheStats,
    pub records: CacheStats,
    pub ratings: CacheStats,
    pub overall: CacheStats,
}

/// Explicitly constructed cache shared by the resolver and its engines
#[derive(Debug)]
pub struct CacheLayer {
    /// Descriptor metadata by `{media}:{id}:{language}`
    pub descriptors: TtlCache<Descriptor>,
    /// Index search results by term
    pub searches: TtlCache<Vec<IndexItem>>,
    /// Resolved records by fingerprint
    pub records: TtlCache<EnrichmentRecord>,
    /// Rating lookups by `{query}_{year}`; `None` is a cached "not found"
    pub ratings: TtlCache<Option<RatingInfo>>,
}

impl CacheLayer {
    pub fn new(ttls: CacheTtls, max_entries: usize) -> Self {
        Self {
            descriptors: TtlCache::new("descriptors", ttls.descriptors)
                .with_max_entries(max_entries),
            searches: TtlCache::new("searches", ttls.searches).with_max_entries(max_entries),
            records: TtlCache::new("records", ttls.records).with_max_entries(max_entries),
            ratings: TtlCache::new("ratings", ttls.ratings).with_max_entries(max_entries),
        }
    }

    pub fn stats(&self, domain: CacheDomain) -> CacheStats {
        match domain {
            CacheDomain::Descriptors => self.descriptors.stats(),
            CacheDomain::Searches => self.searches.stats(),
            CacheDomain::Records => self.records.stats(),
            CacheDomain::Ratings => self.ratings.stats(),
        }
    }

    pub fn summary(&self) -> CacheSummary {
        let descriptors = self.descriptors.stats();
        let searches = self.searches.stats();
        let records = self.records.stats();
        let ratings = self.ratings.stats();

        let all = [descriptors, searches, records, ratings];
        let overall = CacheStats::new(
            all.iter().map(|s| s.hits).sum(),
            all.iter().map(|s| s.misses).sum(),
            all.iter().map(|s| s.size).sum(),
        );

        CacheSummary {
            descriptors,
            searches,
            records,
            ratings,
            overall,
        }
    }

    pub fn clear(&self, scope: CacheScope) {
        match scope {
            CacheScope::Domain(CacheDomain::Descriptors) => self.descriptors.clear(),
            CacheScope::Domain(CacheDomain::Searches) => self.searches.clear(),
            CacheScope::Domain(CacheDomain::Records) => self.records.clear(),
            CacheScope::Domain(CacheDomain::Ratings) => self.ratings.clear(),
            CacheScope::All => {
                self.descriptors.clear();
                self.searches.clear();
                self.records.clear();
                self.ratings.clear();
                self.descriptors.reset_stats();
                self.searches.reset_stats();
                self.records.reset_stats();
                self.ratings.reset_stats();
            }
        }
    }

    pub fn purge_expired(&self, domain: CacheDomain) -> usize {
        match domain {
            CacheDomain::Descriptors => self.descriptors.purge_expired(),
            CacheDomain::Searches => self.searches.purge_expired(),
            CacheDomain::Records => self.records.purge_expired(),
            CacheDomain::Ratings => self.ratings.purge_expired(),
        }
    }
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new(CacheTtls::default(), DEFAULT_MAX_ENTRIES)
    }
}
