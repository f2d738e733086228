// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Training insights computed from the recent activity window.

use crate::models::goal::Goal;
use crate::models::insights::{
    GoalProgress, HeatmapPoint, SportBreakdown, TargetProgress, TrainingInsights, WeeklyDistance,
};
use crate::models::{Activity, StravaActivitySummary};
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeMap;

/// Cap on heatmap points returned to the client.
pub const MAX_HEATMAP_POINTS: usize = 20_000;

/// Compute totals, breakdowns, and goal progress from an activity window.
pub fn compute_insights(
    activities: &[StravaActivitySummary],
    goal: Option<&Goal>,
) -> TrainingInsights {
    let mut total_distance_m = 0.0;
    let mut total_moving_secs: u64 = 0;
    let mut total_elevation_m = 0.0;
    let mut sports: BTreeMap<String, (u32, f64)> = BTreeMap::new();
    let mut weekly: BTreeMap<(i32, u32), f64> = BTreeMap::new();

    for activity in activities {
        total_distance_m += activity.distance;
        total_moving_secs += activity.moving_time;
        total_elevation_m += activity.total_elevation_gain;

        let sport = sports.entry(activity.sport_type.clone()).or_default();
        sport.0 += 1;
        sport.1 += activity.distance;

        if let Some(start) = parse_start_date(&activity.start_date) {
            let week = start.iso_week();
            *weekly.entry((week.year(), week.week())).or_default() += activity.distance;
        }
    }

    let mut sports: Vec<SportBreakdown> = sports
        .into_iter()
        .map(|(sport_type, (count, distance_m))| SportBreakdown {
            sport_type,
            count,
            distance_km: distance_m / 1000.0,
        })
        .collect();
    sports.sort_by(|a, b| b.count.cmp(&a.count).then(a.sport_type.cmp(&b.sport_type)));

    let weekly_distance = weekly
        .into_iter()
        .map(|((year, week), distance_m)| WeeklyDistance {
            week: format!("{}-W{:02}", year, week),
            distance_km: distance_m / 1000.0,
        })
        .collect();

    let goal_progress = goal.map(|goal| goal_progress(activities, goal));

    TrainingInsights {
        total_activities: activities.len() as u32,
        total_distance_km: total_distance_m / 1000.0,
        total_moving_time_hours: total_moving_secs as f64 / 3600.0,
        total_elevation_m,
        sports,
        weekly_distance,
        goal_progress,
    }
}

/// Progress toward a year's goal, counting only that year's activities.
fn goal_progress(activities: &[StravaActivitySummary], goal: &Goal) -> GoalProgress {
    let mut distance_m = 0.0;
    let mut count: u32 = 0;
    let mut elevation_m = 0.0;

    for activity in activities {
        let in_year = parse_start_date(&activity.start_date)
            .map(|d| d.year() == goal.year)
            .unwrap_or(false);
        if !in_year {
            continue;
        }
        distance_m += activity.distance;
        count += 1;
        elevation_m += activity.total_elevation_gain;
    }

    GoalProgress {
        year: goal.year,
        distance_km: goal
            .distance_km
            .map(|target| TargetProgress::new(target, distance_m / 1000.0)),
        activity_count: goal
            .activity_count
            .map(|target| TargetProgress::new(f64::from(target), f64::from(count))),
        elevation_m: goal
            .elevation_m
            .map(|target| TargetProgress::new(target, elevation_m)),
    }
}

/// Decode activity polylines into a flat, capped point list for the heatmap.
pub fn heatmap_points(activities: &[Activity], max_points: usize) -> Vec<HeatmapPoint> {
    let mut points = Vec::new();

    for activity in activities {
        let Some(encoded) = activity.polyline.as_deref() else {
            continue;
        };
        // Strava polylines use precision 5.
        let line = match polyline::decode_polyline(encoded, 5) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(activity_id = activity.id, error = %e, "Skipping undecodable polyline");
                continue;
            }
        };
        for coord in line.coords() {
            points.push(HeatmapPoint {
                lat: coord.y,
                lng: coord.x,
            });
        }
    }

    // Downsample evenly rather than truncating whole activities.
    if points.len() > max_points {
        let step = points.len().div_ceil(max_points);
        points = points.into_iter().step_by(step).collect();
    }
    points
}

fn parse_start_date(start_date: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(start_date)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::format_utc_rfc3339;

    fn summary(sport: &str, distance: f64, start: &str) -> StravaActivitySummary {
        StravaActivitySummary {
            id: 1,
            name: "a".to_string(),
            sport_type: sport.to_string(),
            start_date: start.to_string(),
            distance,
            moving_time: 1800,
            total_elevation_gain: 100.0,
            average_speed: None,
            kudos_count: None,
        }
    }

    #[test]
    fn test_totals_and_sport_breakdown() {
        let activities = vec![
            summary("Ride", 30_000.0, "2026-05-04T08:00:00Z"),
            summary("Ride", 20_000.0, "2026-05-05T08:00:00Z"),
            summary("Run", 10_000.0, "2026-05-06T08:00:00Z"),
        ];

        let insights = compute_insights(&activities, None);
        assert_eq!(insights.total_activities, 3);
        assert!((insights.total_distance_km - 60.0).abs() < 1e-9);
        assert_eq!(insights.sports[0].sport_type, "Ride");
        assert_eq!(insights.sports[0].count, 2);
        assert!(insights.goal_progress.is_none());
    }

    #[test]
    fn test_weekly_buckets_are_ordered() {
        let activities = vec![
            summary("Run", 5_000.0, "2026-01-05T08:00:00Z"),
            summary("Run", 7_000.0, "2026-01-14T08:00:00Z"),
            summary("Run", 3_000.0, "2026-01-06T08:00:00Z"),
        ];

        let insights = compute_insights(&activities, None);
        assert_eq!(insights.weekly_distance.len(), 2);
        assert_eq!(insights.weekly_distance[0].week, "2026-W02");
        assert!((insights.weekly_distance[0].distance_km - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_goal_progress_only_counts_goal_year() {
        let activities = vec![
            summary("Ride", 400_000.0, "2025-06-01T08:00:00Z"),
            summary("Ride", 250_000.0, "2026-03-01T08:00:00Z"),
        ];
        let goal = Goal {
            user_id: "u1".to_string(),
            year: 2026,
            distance_km: Some(1000.0),
            activity_count: Some(10),
            elevation_m: None,
            updated_at: format_utc_rfc3339(chrono::Utc::now()),
        };

        let insights = compute_insights(&activities, Some(&goal));
        let progress = insights.goal_progress.unwrap();
        let distance = progress.distance_km.unwrap();
        assert!((distance.current - 250.0).abs() < 1e-9);
        assert!((distance.fraction - 0.25).abs() < 1e-9);
        assert_eq!(progress.activity_count.unwrap().current, 1.0);
        assert!(progress.elevation_m.is_none());
    }

    #[test]
    fn test_heatmap_points_decode_and_cap() {
        // Classic 3-point example line, precision 5:
        // (38.5, -120.2), (40.7, -120.95), (43.252, -126.453)
        let encoded = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

        let mut activity = Activity::from_summary(summary("Ride", 1000.0, "2026-05-01T08:00:00Z"));
        activity.polyline = Some(encoded.to_string());
        activity.detailed = true;

        let points = heatmap_points(std::slice::from_ref(&activity), 100);
        assert_eq!(points.len(), 3);
        assert!((points[0].lat - 38.5).abs() < 1e-4);
        assert!((points[0].lng + 120.2).abs() < 1e-4);

        let capped = heatmap_points(std::slice::from_ref(&activity), 2);
        assert!(capped.len() <= 2);
    }
}
