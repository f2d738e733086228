// SPDX-License-Identifier: MIT
// Copyright 2026 StravAwesome contributors

//! Annual training goal model and request payload validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Annual goal stored per user per year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Owning user (Google subject)
    pub user_id: String,
    /// Calendar year this goal applies to
    pub year: i32,
    /// Target distance in kilometers
    pub distance_km: Option<f64>,
    /// Target activity count
    pub activity_count: Option<u32>,
    /// Target elevation gain in meters
    pub elevation_m: Option<f64>,
    /// Last update timestamp (ISO 8601)
    pub updated_at: String,
}

/// Payload for creating or replacing a goal.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GoalPayload {
    #[validate(range(min = 2000, max = 2100, message = "year must be between 2000 and 2100"))]
    pub year: i32,
    #[validate(range(min = 0.0, max = 1_000_000.0, message = "distance_km out of range"))]
    pub distance_km: Option<f64>,
    #[validate(range(min = 0, max = 100_000, message = "activity_count out of range"))]
    pub activity_count: Option<u32>,
    #[validate(range(min = 0.0, max = 10_000_000.0, message = "elevation_m out of range"))]
    pub elevation_m: Option<f64>,
}

impl GoalPayload {
    /// A goal with no targets at all is meaningless; reject it.
    pub fn has_target(&self) -> bool {
        self.distance_km.is_some() || self.activity_count.is_some() || self.elevation_m.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_payload_passes() {
        let payload = GoalPayload {
            year: 2026,
            distance_km: Some(2000.0),
            activity_count: None,
            elevation_m: None,
        };
        assert!(payload.validate().is_ok());
        assert!(payload.has_target());
    }

    #[test]
    fn test_year_out_of_range_fails() {
        let payload = GoalPayload {
            year: 1850,
            distance_km: Some(100.0),
            activity_count: None,
            elevation_m: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_negative_distance_fails() {
        let payload = GoalPayload {
            year: 2026,
            distance_km: Some(-5.0),
            activity_count: None,
            elevation_m: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_empty_targets_detected() {
        let payload = GoalPayload {
            year: 2026,
            distance_km: None,
            activity_count: None,
            elevation_m: None,
        };
        assert!(payload.validate().is_ok());
        assert!(!payload.has_target());
    }
}
