// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Strava activity models as returned by the upstream API.

use serde::{Deserialize, Serialize};

/// Summary activity from `GET /athlete/activities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    pub start_date: String,
    /// Distance in meters
    pub distance: f64,
    /// Moving time in seconds
    #[serde(default)]
    pub moving_time: u64,
    /// Total elevation gain in meters
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub average_speed: Option<f64>,
    #[serde(default)]
    pub kudos_count: Option<u32>,
}

/// Detailed activity from `GET /activities/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaActivityDetail {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    pub start_date: String,
    pub distance: f64,
    #[serde(default)]
    pub moving_time: u64,
    #[serde(default)]
    pub total_elevation_gain: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub start_latlng: Option<Vec<f64>>,
    #[serde(default)]
    pub end_latlng: Option<Vec<f64>>,
    #[serde(default)]
    pub map: Option<StravaMap>,
}

/// Activity map data with polylines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaMap {
    #[serde(default)]
    pub polyline: Option<String>,
    #[serde(default)]
    pub summary_polyline: Option<String>,
}

impl StravaMap {
    /// Get the detailed polyline, falling back to summary if not available.
    pub fn best_polyline(&self) -> Option<&str> {
        self.polyline
            .as_deref()
            .or(self.summary_polyline.as_deref())
    }
}

/// Activity record served to the dashboard: a summary, optionally enriched
/// with the geographic fields from the detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: u64,
    pub name: String,
    pub sport_type: String,
    pub start_date: String,
    pub distance: f64,
    pub moving_time: u64,
    pub total_elevation_gain: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kudos_count: Option<u32>,
    /// Whether the detail fields below were populated
    pub detailed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polyline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_latlng: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_latlng: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

impl Activity {
    /// Basic (non-detailed) form of a summary record.
    pub fn from_summary(summary: StravaActivitySummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            sport_type: summary.sport_type,
            start_date: summary.start_date,
            distance: summary.distance,
            moving_time: summary.moving_time,
            total_elevation_gain: summary.total_elevation_gain,
            average_speed: summary.average_speed,
            kudos_count: summary.kudos_count,
            detailed: false,
            polyline: None,
            start_latlng: None,
            end_latlng: None,
            device_name: None,
        }
    }

    /// Merge geographic fields from a detail record into the summary form.
    pub fn with_detail(summary: StravaActivitySummary, detail: StravaActivityDetail) -> Self {
        let polyline = detail
            .map
            .as_ref()
            .and_then(|m| m.best_polyline())
            .map(|p| p.to_string());
        Self {
            detailed: true,
            polyline,
            start_latlng: detail.start_latlng,
            end_latlng: detail.end_latlng,
            device_name: detail.device_name,
            ..Self::from_summary(summary)
        }
    }
}

/// A photo attached to an activity, from `GET /activities/{id}/photos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPhoto {
    pub unique_id: String,
    #[serde(default)]
    pub activity_id: Option<u64>,
    /// Size label -> URL, as Strava returns it
    #[serde(default)]
    pub urls: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: u64) -> StravaActivitySummary {
        StravaActivitySummary {
            id,
            name: "Morning Ride".to_string(),
            sport_type: "Ride".to_string(),
            start_date: "2026-05-01T07:00:00Z".to_string(),
            distance: 25_000.0,
            moving_time: 3600,
            total_elevation_gain: 300.0,
            average_speed: Some(6.9),
            kudos_count: Some(3),
        }
    }

    #[test]
    fn test_from_summary_is_not_detailed() {
        let activity = Activity::from_summary(summary(1));
        assert!(!activity.detailed);
        assert!(activity.polyline.is_none());
    }

    #[test]
    fn test_with_detail_prefers_full_polyline() {
        let detail = StravaActivityDetail {
            id: 1,
            name: "Morning Ride".to_string(),
            sport_type: "Ride".to_string(),
            start_date: "2026-05-01T07:00:00Z".to_string(),
            distance: 25_000.0,
            moving_time: 3600,
            total_elevation_gain: 300.0,
            description: None,
            device_name: Some("Garmin Edge 530".to_string()),
            start_latlng: Some(vec![37.4, -122.1]),
            end_latlng: Some(vec![37.5, -122.2]),
            map: Some(StravaMap {
                polyline: Some("full".to_string()),
                summary_polyline: Some("summary".to_string()),
            }),
        };

        let activity = Activity::with_detail(summary(1), detail);
        assert!(activity.detailed);
        assert_eq!(activity.polyline.as_deref(), Some("full"));
        assert_eq!(activity.device_name.as_deref(), Some("Garmin Edge 530"));
    }

    #[test]
    fn test_map_falls_back_to_summary_polyline() {
        let map = StravaMap {
            polyline: None,
            summary_polyline: Some("summary".to_string()),
        };
        assert_eq!(map.best_polyline(), Some("summary"));
    }
}
