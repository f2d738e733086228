// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Cached, rate-limit-tolerant activity fetching.
//!
//! Read paths degrade instead of failing: an upstream 429 is answered from
//! stale cache when one exists, or an empty list when none does, so the
//! dashboard keeps rendering while Strava cools down. Hard failure is
//! reserved for upstream errors with no cached fallback.
//!
//! Detail and photo calls go through the shared [`RequestThrottle`] with
//! bounded concurrency (`buffer_unordered`), so a large activity list cannot
//! burst the upstream API.

use crate::error::AppError;
use crate::models::{Activity, ActivityPhoto, StravaActivityDetail, StravaActivitySummary};
use crate::services::cache::{KeyedLocks, ResponseCache, SWEEP_INTERVAL};
use crate::services::retry::RetryPolicy;
use crate::services::strava::StravaClient;
use crate::services::throttle::RequestThrottle;
use futures_util::{stream, StreamExt};
use std::time::Duration;

/// Timeout for the main activities fetch, enforced by cancellation.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(12);

/// Fixed TTL for per-activity detail cache entries.
const DETAILS_TTL: Duration = Duration::from_secs(30 * 60);

/// TTL for per-activity photo cache entries.
const PHOTOS_TTL: Duration = Duration::from_secs(15 * 60);

/// In-flight cap for the detail/photo fan-out.
const DETAIL_CONCURRENCY: usize = 8;

/// Throttle priorities: details ahead of photos.
const PRIORITY_DETAIL: i32 = 2;
const PRIORITY_PHOTO: i32 = 1;

/// Retry shapes per path. The list fetch never retries (degradation handles
/// 429); details get three attempts, photos two.
const LIST_RETRY: RetryPolicy = RetryPolicy::none();
const DETAIL_RETRY: RetryPolicy =
    RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(30));
const PHOTO_RETRY: RetryPolicy =
    RetryPolicy::new(2, Duration::from_millis(500), Duration::from_secs(30));

/// Options for a list fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Cache key for this query shape (per user + filter).
    pub cache_key: String,
    /// How long a fresh result stays servable.
    pub ttl: Duration,
    /// Only activities after this Unix timestamp.
    pub after: Option<i64>,
    /// Overall deadline for the upstream call.
    pub timeout: Duration,
}

impl FetchOptions {
    pub fn new(cache_key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache_key: cache_key.into(),
            ttl,
            after: None,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn after(mut self, after: Option<i64>) -> Self {
        self.after = after;
        self
    }
}

/// Fetches activity data with caching, retry, and graceful degradation.
#[derive(Clone)]
pub struct ActivityFetcher {
    client: StravaClient,
    throttle: RequestThrottle,
    activities_cache: ResponseCache<Vec<StravaActivitySummary>>,
    details_cache: ResponseCache<StravaActivityDetail>,
    photos_cache: ResponseCache<Vec<ActivityPhoto>>,
    fetch_locks: KeyedLocks,
}

impl ActivityFetcher {
    pub fn new(client: StravaClient, throttle: RequestThrottle) -> Self {
        Self {
            client,
            throttle,
            activities_cache: ResponseCache::with_sweeper(SWEEP_INTERVAL),
            details_cache: ResponseCache::with_sweeper(SWEEP_INTERVAL),
            photos_cache: ResponseCache::with_sweeper(SWEEP_INTERVAL),
            fetch_locks: KeyedLocks::new(),
        }
    }

    /// Fetch an activity list, serving from cache when a fresh entry covers
    /// the requested count.
    ///
    /// Degradation rules on upstream trouble:
    /// - 429: stale cache if it covers the count, else an empty list.
    ///   Rate limiting never surfaces as an error on this path.
    /// - timeout / other failure: stale cache if available, else the error.
    pub async fn fetch_activities(
        &self,
        access_token: &str,
        count_hint: usize,
        opts: &FetchOptions,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        if let Some(cached) = self.activities_cache.get(&opts.cache_key, count_hint) {
            return Ok(cached);
        }

        // Single-flight per cache key: late arrivals wait for the in-flight
        // fetch and read its result from the cache.
        let lock = self.fetch_locks.for_key(&opts.cache_key);
        let _guard = lock.lock().await;

        if let Some(cached) = self.activities_cache.get(&opts.cache_key, count_hint) {
            return Ok(cached);
        }

        let per_page = count_hint.clamp(1, 200) as u32;
        let call = LIST_RETRY.run(|| {
            self.client
                .list_activities(access_token, per_page, opts.after)
        });

        let result = match tokio::time::timeout(opts.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StravaApi("activities request timed out".to_string())),
        };

        match result {
            Ok(activities) => {
                self.activities_cache.insert(
                    opts.cache_key.clone(),
                    activities.clone(),
                    opts.ttl,
                    count_hint,
                );
                Ok(activities)
            }
            Err(AppError::StravaRateLimited { retry_after_secs }) => {
                if let Some(stale) = self.activities_cache.get_stale(&opts.cache_key, count_hint) {
                    tracing::warn!(
                        cache_key = %opts.cache_key,
                        ?retry_after_secs,
                        "Rate limited, serving stale activities"
                    );
                    Ok(stale)
                } else {
                    tracing::warn!(
                        cache_key = %opts.cache_key,
                        ?retry_after_secs,
                        "Rate limited with no cached activities, returning empty"
                    );
                    Ok(Vec::new())
                }
            }
            Err(e) => {
                if let Some(stale) = self.activities_cache.get_stale(&opts.cache_key, count_hint) {
                    tracing::warn!(cache_key = %opts.cache_key, error = %e, "Upstream failed, serving stale activities");
                    Ok(stale)
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Fetch one activity's detail record, with its own 30-minute cache and
    /// up to three attempts on 429. Returns None once retries are exhausted
    /// or on any other failure; the caller falls back to the summary form.
    pub async fn fetch_activity_details(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Option<StravaActivityDetail> {
        let cache_key = format!("detail:{}", activity_id);
        if let Some(cached) = self.details_cache.get(&cache_key, 0) {
            return Some(cached);
        }

        let result = DETAIL_RETRY
            .run(|| {
                let client = self.client.clone();
                let token = access_token.to_string();
                self.throttle.enqueue(PRIORITY_DETAIL, async move {
                    client.get_activity(&token, activity_id).await
                })
            })
            .await;

        match result {
            Ok(detail) => {
                self.details_cache
                    .insert(cache_key, detail.clone(), DETAILS_TTL, 0);
                Some(detail)
            }
            Err(e) => {
                tracing::warn!(activity_id, error = %e, "Detail fetch failed, degrading to summary");
                None
            }
        }
    }

    /// Fetch the activity list and enrich each record with geographic detail.
    ///
    /// Detail calls run with settle-all semantics under a concurrency cap:
    /// one slow or failing detail call cannot abort the others, and a failed
    /// detail leaves that record in its basic form.
    pub async fn fetch_activities_with_details(
        &self,
        access_token: &str,
        count_hint: usize,
        opts: &FetchOptions,
    ) -> Result<Vec<Activity>, AppError> {
        let summaries = self.fetch_activities(access_token, count_hint, opts).await?;

        let mut enriched: Vec<(usize, Activity)> = stream::iter(summaries.into_iter().enumerate())
            .map(|(idx, summary)| async move {
                let activity = match self.fetch_activity_details(access_token, summary.id).await {
                    Some(detail) => Activity::with_detail(summary, detail),
                    None => Activity::from_summary(summary),
                };
                (idx, activity)
            })
            .buffer_unordered(DETAIL_CONCURRENCY)
            .collect()
            .await;

        // Restore upstream (newest-first) ordering.
        enriched.sort_by_key(|(idx, _)| *idx);
        Ok(enriched.into_iter().map(|(_, activity)| activity).collect())
    }

    /// Fetch photos for an activity, with the same degradation shape as the
    /// activity list (stale on 429/failure, empty when nothing is cached).
    pub async fn fetch_activity_photos(
        &self,
        access_token: &str,
        activity_id: u64,
    ) -> Result<Vec<ActivityPhoto>, AppError> {
        let cache_key = format!("photos:{}", activity_id);
        if let Some(cached) = self.photos_cache.get(&cache_key, 0) {
            return Ok(cached);
        }

        let result = PHOTO_RETRY
            .run(|| {
                let client = self.client.clone();
                let token = access_token.to_string();
                self.throttle.enqueue(PRIORITY_PHOTO, async move {
                    client.get_activity_photos(&token, activity_id).await
                })
            })
            .await;

        match result {
            Ok(photos) => {
                self.photos_cache
                    .insert(cache_key, photos.clone(), PHOTOS_TTL, 0);
                Ok(photos)
            }
            Err(AppError::StravaRateLimited { .. }) => {
                Ok(self.photos_cache.get_stale(&cache_key, 0).unwrap_or_default())
            }
            Err(e) => match self.photos_cache.get_stale(&cache_key, 0) {
                Some(stale) => Ok(stale),
                None => Err(e),
            },
        }
    }

    /// Drop cached lists for a user (after disconnect).
    pub fn invalidate_user(&self, cache_key_prefix: &str) {
        self.activities_cache.remove_prefix(cache_key_prefix);
    }
}
