// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! In-memory TTL caches for upstream API responses.
//!
//! Entries carry the `requested_size` high-water mark: an entry recorded for
//! a request of N items satisfies any later request for ≤ N items, and never
//! a larger one (a truncated result must not be served for a bigger request).
//!
//! Caches are plain values owned by the composition root and injected where
//! needed; nothing in here is a module-level singleton. Deadlines use
//! `tokio::time::Instant` so tests can drive expiry under a paused clock.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// How often the background sweep drops expired entries.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: Instant,
    requested_size: usize,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn satisfies(&self, min_size: usize) -> bool {
        self.requested_size >= min_size
    }
}

/// TTL cache with size-sufficiency tracking and optional background sweep.
pub struct ResponseCache<T> {
    entries: Arc<DashMap<String, CacheEntry<T>>>,
    shutdown_tx: Option<Arc<mpsc::Sender<()>>>,
}

impl<T> Clone for ResponseCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ResponseCache<T> {
    /// Cache without a background sweep (expired entries are dropped lazily).
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            shutdown_tx: None,
        }
    }

    /// Cache with a background task sweeping expired entries to bound memory.
    pub fn with_sweeper(interval: Duration) -> Self {
        let entries: Arc<DashMap<String, CacheEntry<T>>> = Arc::new(DashMap::new());
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let sweep_entries = entries.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let before = sweep_entries.len();
                        sweep_entries.retain(|_, entry| !entry.is_expired());
                        let removed = before.saturating_sub(sweep_entries.len());
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired cache entries");
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            entries,
            shutdown_tx: Some(Arc::new(shutdown_tx)),
        }
    }

    /// Fresh lookup: entry must be unexpired and recorded for a request of at
    /// least `min_size` items.
    pub fn get(&self, key: &str, min_size: usize) -> Option<T> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() || !entry.satisfies(min_size) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Stale lookup: ignores expiry but still applies size sufficiency.
    /// Used for degradation when the upstream is rate limited or down.
    pub fn get_stale(&self, key: &str, min_size: usize) -> Option<T> {
        let entry = self.entries.get(key)?;
        if !entry.satisfies(min_size) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store a value with its TTL and the size of the request that produced it.
    pub fn insert(&self, key: impl Into<String>, value: T, ttl: Duration, requested_size: usize) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                requested_size,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry whose key starts with `prefix` (cache keys embed the
    /// user id, so this invalidates one user's entries on disconnect).
    pub fn remove_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ResponseCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ResponseCache<T> {
    fn drop(&mut self) {
        // Stop the sweep task when the last clone goes away.
        if let Some(tx) = &self.shutdown_tx {
            if Arc::strong_count(tx) == 1 {
                let _ = tx.try_send(());
            }
        }
    }
}

/// Per-key async locks for single-flight upstream fetches.
///
/// Callers acquire the key's mutex, then re-check the cache before fetching:
/// late arrivals for the same key block until the in-flight fetch completes
/// and find its result in the cache instead of duplicating the upstream call.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for a key. Hold the returned Arc while
    /// locking so the entry cannot be swapped out from under the guard.
    pub fn for_key(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
