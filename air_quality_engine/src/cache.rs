//! Coordinate-keyed TTL cache of aggregated readings.
//!
//! Keys round latitude and longitude to three decimals (about 110 m), so
//! nearby requests share an entry. Readers take the shared lock; writes are
//! last-write-wins. Once the map grows past the purge threshold, every write
//! also sweeps out expired entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use air_data_ingestor::Coordinate;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{clock::Clock, reading::AggregatedReading};

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Entry count above which `put` sweeps expired entries.
pub const DEFAULT_PURGE_THRESHOLD: usize = 1024;

/// Cache key for a coordinate: both components rounded to 3 decimals.
pub fn cache_key(coordinate: &Coordinate) -> String {
    // `+ 0.0` folds -0.0 into 0.0 so both hemispheres of the equator share a key.
    let round3 = |v: f64| (v * 1000.0).round() / 1000.0 + 0.0;
    format!(
        "{:.3}_{:.3}",
        round3(coordinate.latitude()),
        round3(coordinate.longitude())
    )
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Arc<AggregatedReading>,
    pub cached_at: DateTime<Utc>,
    pub ttl: TimeDelta,
}

impl CacheEntry {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now - self.cached_at < self.ttl
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct ReadingCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: TimeDelta,
    purge_threshold: usize,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ReadingCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            purge_threshold: DEFAULT_PURGE_THRESHOLD,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_purge_threshold(mut self, threshold: usize) -> Self {
        self.purge_threshold = threshold;
        self
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Returns the cached reading if one exists and has not expired.
    pub async fn get(&self, coordinate: &Coordinate) -> Option<Arc<AggregatedReading>> {
        let key = cache_key(coordinate);
        let now = self.clock.now();

        let found = {
            let entries = self.entries.read().await;
            entries
                .get(&key)
                .filter(|entry| entry.is_fresh_at(now))
                .map(|entry| Arc::clone(&entry.payload))
        };

        match found {
            Some(reading) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "cache hit");
                Some(reading)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(%key, "cache miss");
                None
            }
        }
    }

    pub async fn put(&self, coordinate: &Coordinate, reading: Arc<AggregatedReading>) {
        let now = self.clock.now();
        let entry = CacheEntry {
            payload: reading,
            cached_at: now,
            ttl: self.ttl,
        };

        let mut entries = self.entries.write().await;
        entries.insert(cache_key(coordinate), entry);
        if entries.len() > self.purge_threshold {
            let before = entries.len();
            entries.retain(|_, entry| entry.is_fresh_at(now));
            debug!(removed = before - entries.len(), "swept expired cache entries");
        }
    }

    /// Drops expired entries and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh_at(now));
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
