//! Time-limited cache in front of a quote provider.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::provider::QuoteProvider;
use crate::types::PriceSeries;
use crate::Result;

/// Default time a fetched series stays fresh.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct CacheEntry {
    fetched_at: Instant,
    series: PriceSeries,
}

/// Caches each symbol's history for a fixed time-to-live.
///
/// The cache is owned by the caller and shared by reference (or `Arc`) between
/// backtests. Failed fetches are never cached. Expired entries are swept on
/// every insert, so the map only holds symbols fetched within the last `ttl`.
pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl<P: QuoteProvider> CachedProvider<P> {
    /// Wrap `inner` with the default 24 hour TTL.
    pub fn new(inner: P) -> Self {
        Self::with_ttl(inner, DEFAULT_CACHE_TTL)
    }

    /// Wrap `inner` with a custom TTL.
    pub fn with_ttl(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Lock the entries mutex, recovering from poison if necessary.
    ///
    /// A poisoned cache only risks serving a stale entry, which the TTL check
    /// still bounds.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Quote cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Drop the cached entry for one symbol.
    pub fn invalidate(&self, symbol: &str) {
        self.lock_entries().remove(&symbol.to_uppercase());
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    /// Number of entries currently held, fresh or stale.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}

impl<P: QuoteProvider> QuoteProvider for CachedProvider<P> {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn fetch_history(&self, symbol: &str) -> Result<PriceSeries> {
        let key = symbol.to_uppercase();

        if let Some(entry) = self.lock_entries().get(&key) {
            if entry.fetched_at.elapsed() < self.ttl {
                tracing::debug!("Quote cache hit for {}", key);
                return Ok(entry.series.clone());
            }
        }

        // Fetch without holding the lock so slow providers don't block other symbols
        tracing::debug!("Quote cache miss for {}, fetching from {}", key, self.inner.id());
        let series = self.inner.fetch_history(&key)?;

        let ttl = self.ttl;
        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.fetched_at.elapsed() < ttl);
        if entries.len() < before {
            tracing::debug!("Evicted {} expired quote cache entries", before - entries.len());
        }

        entries.insert(
            key,
            CacheEntry {
                fetched_at: Instant::now(),
                series: series.clone(),
            },
        );
        Ok(series)
    }
}
