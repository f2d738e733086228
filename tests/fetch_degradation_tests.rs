// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Degradation behavior of the activity fetcher against a misbehaving
//! upstream: stale-cache fallback, empty-list degradation on 429, cache
//! size sufficiency, and detail-fetch isolation.

use std::sync::atomic::Ordering;
use std::time::Duration;
use stravawesome::services::fetcher::FetchOptions;
use stravawesome::services::{ActivityFetcher, RequestThrottle, StravaClient};

mod common;
use common::{spawn_fake_strava, UpstreamMode, TEST_THROTTLE_SPACING};

fn make_fetcher(base_url: &str) -> ActivityFetcher {
    let client = StravaClient::with_base_url(
        "client_id".to_string(),
        "client_secret".to_string(),
        base_url,
    );
    ActivityFetcher::new(client, RequestThrottle::new(TEST_THROTTLE_SPACING))
}

#[tokio::test]
async fn test_429_with_no_cache_returns_empty_list() {
    let fake = spawn_fake_strava().await;
    fake.state.set_mode(UpstreamMode::RateLimited {
        retry_after: Some(30),
    });

    let fetcher = make_fetcher(&fake.base_url);
    let opts = FetchOptions::new("acts:u1:0", Duration::from_secs(300));

    let result = fetcher.fetch_activities("token", 30, &opts).await;
    let activities = result.expect("429 must degrade, not error");
    assert!(activities.is_empty());
}

#[tokio::test]
async fn test_429_with_stale_cache_returns_stale_value() {
    let fake = spawn_fake_strava().await;
    let fetcher = make_fetcher(&fake.base_url);

    // TTL zero: the entry is stale the moment it lands.
    let opts = FetchOptions::new("acts:u1:0", Duration::ZERO);
    let first = fetcher.fetch_activities("token", 30, &opts).await.unwrap();
    assert_eq!(first.len(), 3);

    fake.state.set_mode(UpstreamMode::RateLimited {
        retry_after: Some(30),
    });

    let second = fetcher.fetch_activities("token", 30, &opts).await.unwrap();
    assert_eq!(second.len(), 3, "stale entry must be served on 429");
    assert_eq!(second[0].id, first[0].id);
}

#[tokio::test]
async fn test_server_error_with_stale_cache_degrades() {
    let fake = spawn_fake_strava().await;
    let fetcher = make_fetcher(&fake.base_url);

    let opts = FetchOptions::new("acts:u1:0", Duration::ZERO);
    fetcher.fetch_activities("token", 30, &opts).await.unwrap();

    fake.state.set_mode(UpstreamMode::ServerError);
    let degraded = fetcher.fetch_activities("token", 30, &opts).await.unwrap();
    assert_eq!(degraded.len(), 3);
}

#[tokio::test]
async fn test_server_error_with_no_cache_propagates() {
    let fake = spawn_fake_strava().await;
    fake.state.set_mode(UpstreamMode::ServerError);

    let fetcher = make_fetcher(&fake.base_url);
    let opts = FetchOptions::new("acts:u1:0", Duration::from_secs(300));

    let result = fetcher.fetch_activities("token", 30, &opts).await;
    assert!(result.is_err(), "no fallback exists, the error must surface");
}

#[tokio::test]
async fn test_cache_sufficiency_governs_network_calls() {
    let fake = spawn_fake_strava().await;
    let fetcher = make_fetcher(&fake.base_url);
    let opts = FetchOptions::new("acts:u1:0", Duration::from_secs(300));

    fetcher.fetch_activities("token", 30, &opts).await.unwrap();
    assert_eq!(fake.state.activities_calls.load(Ordering::SeqCst), 1);

    // Smaller hint: served from the cached entry, no upstream call.
    fetcher.fetch_activities("token", 10, &opts).await.unwrap();
    assert_eq!(fake.state.activities_calls.load(Ordering::SeqCst), 1);

    // Larger hint: the cached entry may be truncated, must refetch.
    fetcher.fetch_activities("token", 50, &opts).await.unwrap();
    assert_eq!(fake.state.activities_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_fetches_are_single_flight() {
    let fake = spawn_fake_strava().await;
    let fetcher = make_fetcher(&fake.base_url);
    let opts = FetchOptions::new("acts:u1:0", Duration::from_secs(300));

    let (a, b) = tokio::join!(
        fetcher.fetch_activities("token", 30, &opts),
        fetcher.fetch_activities("token", 30, &opts),
    );
    assert_eq!(a.unwrap().len(), 3);
    assert_eq!(b.unwrap().len(), 3);
    assert_eq!(
        fake.state.activities_calls.load(Ordering::SeqCst),
        1,
        "late arrival must await the in-flight fetch"
    );
}

#[tokio::test]
async fn test_detail_failure_degrades_only_that_record() {
    let fake = spawn_fake_strava().await;
    fake.state.fail_details_for(2);

    let fetcher = make_fetcher(&fake.base_url);
    let opts = FetchOptions::new("acts:u1:0", Duration::from_secs(300));

    let activities = fetcher
        .fetch_activities_with_details("token", 3, &opts)
        .await
        .unwrap();

    assert_eq!(activities.len(), 3, "failed detail must not drop the record");
    assert_eq!(
        activities.iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![1, 2, 3],
        "upstream ordering preserved"
    );

    let degraded = activities.iter().find(|a| a.id == 2).unwrap();
    assert!(!degraded.detailed);
    assert!(degraded.polyline.is_none());

    for activity in activities.iter().filter(|a| a.id != 2) {
        assert!(activity.detailed, "activity {} should be detailed", activity.id);
        assert!(activity.polyline.is_some());
        assert_eq!(activity.device_name.as_deref(), Some("Garmin Edge 530"));
    }
}

#[tokio::test]
async fn test_details_are_cached_across_calls() {
    let fake = spawn_fake_strava().await;
    let fetcher = make_fetcher(&fake.base_url);
    let opts = FetchOptions::new("acts:u1:0", Duration::from_secs(300));

    fetcher
        .fetch_activities_with_details("token", 3, &opts)
        .await
        .unwrap();
    let first_round = fake.state.detail_calls.load(Ordering::SeqCst);
    assert_eq!(first_round, 3);

    fetcher
        .fetch_activities_with_details("token", 3, &opts)
        .await
        .unwrap();
    assert_eq!(
        fake.state.detail_calls.load(Ordering::SeqCst),
        first_round,
        "details must come from the 30-minute cache"
    );
}

#[tokio::test]
async fn test_photos_cached_and_fetched() {
    let fake = spawn_fake_strava().await;
    let fetcher = make_fetcher(&fake.base_url);

    let photos = fetcher.fetch_activity_photos("token", 1).await.unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].unique_id, "photo-1");
    assert_eq!(fake.state.photo_calls.load(Ordering::SeqCst), 1);

    fetcher.fetch_activity_photos("token", 1).await.unwrap();
    assert_eq!(fake.state.photo_calls.load(Ordering::SeqCst), 1);
}
