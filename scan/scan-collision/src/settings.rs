//! Detector settings.

use serde::{Deserialize, Serialize};

/// Collision detector settings.
///
/// # Example
///
/// ```
/// use scan_collision::CollisionSettings;
///
/// let settings = CollisionSettings::default().with_resolution(0.02);
/// assert_eq!(settings.resolution, 0.02);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Voxel edge length of the obstacle map in meters.
    pub resolution: f64,
    /// Minimum feature points for a cluster to become an obstacle.
    pub min_cluster_points: usize,
    /// Obstacles not re-observed for this many seconds are dropped.
    pub obstacle_ttl_secs: f64,
    /// Center distance within which a new cluster matches a known obstacle.
    pub match_distance: f64,
    /// Displacement above which a matched obstacle is treated as dynamic.
    pub dynamic_motion_threshold: f64,
    /// Margin added around the subject to form the restricted zone.
    pub subject_clearance: f64,
    /// Lookahead used to keep guidance inside the safety zones.
    pub guidance_step: f64,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            resolution: 0.05,
            min_cluster_points: 5,
            obstacle_ttl_secs: 1.0,
            match_distance: 0.15,
            dynamic_motion_threshold: 0.05,
            subject_clearance: 0.1,
            guidance_step: 0.1,
        }
    }
}

impl CollisionSettings {
    /// Sets the map resolution.
    #[must_use]
    pub const fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    /// Sets the minimum cluster size.
    #[must_use]
    pub const fn with_min_cluster_points(mut self, n: usize) -> Self {
        self.min_cluster_points = n;
        self
    }

    /// Sets the subject clearance.
    #[must_use]
    pub const fn with_subject_clearance(mut self, clearance: f64) -> Self {
        self.subject_clearance = clearance;
        self
    }
}
