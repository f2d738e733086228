//! Aggregated training insights served to the dashboard.

use serde::{Deserialize, Serialize};

/// Totals and breakdowns computed from the recent activity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingInsights {
    pub total_activities: u32,
    pub total_distance_km: f64,
    pub total_moving_time_hours: f64,
    pub total_elevation_m: f64,
    /// Per-sport activity counts, most frequent first
    pub sports: Vec<SportBreakdown>,
    /// Distance per ISO week, oldest first
    pub weekly_distance: Vec<WeeklyDistance>,
    /// Progress toward the current year's goal, if one is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_progress: Option<GoalProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportBreakdown {
    pub sport_type: String,
    pub count: u32,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyDistance {
    /// ISO year-week label, e.g. "2026-W18"
    pub week: String,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalProgress {
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<TargetProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_count: Option<TargetProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<TargetProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetProgress {
    pub target: f64,
    pub current: f64,
    /// 0.0 ..= 1.0, clamped
    pub fraction: f64,
}

impl TargetProgress {
    pub fn new(target: f64, current: f64) -> Self {
        let fraction = if target > 0.0 {
            (current / target).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            target,
            current,
            fraction,
        }
    }
}

/// A single decoded coordinate for the heatmap layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub lat: f64,
    pub lng: f64,
}
