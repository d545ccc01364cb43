//! Environment condition snapshots and quality-control records.

use serde::{Deserialize, Serialize};

use crate::{Timestamp, TrackingState};

/// Scene lighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightingCondition {
    /// Ambient intensity in lux.
    pub ambient_intensity: f64,
    /// Color temperature in kelvin.
    pub color_temperature: f64,
}

impl Default for LightingCondition {
    fn default() -> Self {
        Self {
            ambient_intensity: 1000.0,
            color_temperature: 5500.0,
        }
    }
}

/// Device motion between consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionCondition {
    /// Linear speed in m/s.
    pub linear_speed: f64,
    /// Angular speed in rad/s.
    pub angular_speed: f64,
    /// Motion blur estimate in radians swept during one exposure.
    pub blur: f64,
    /// Tracking state at sample time.
    pub tracking: TrackingState,
}

/// Properties of the scanned surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceCondition {
    /// Reflectivity proxy in `[0, 1]`.
    pub reflectivity: f64,
    /// Feature points per mesh vertex.
    pub texture: f64,
    /// Mean angle between adjacent face normals, radians.
    pub roughness: f64,
}

impl Default for SurfaceCondition {
    fn default() -> Self {
        Self {
            reflectivity: 0.5,
            texture: 1.0,
            roughness: 0.0,
        }
    }
}

/// Spatial relationship between device, subject and surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpaceCondition {
    /// Camera to subject distance in meters, if any geometry was seen.
    pub subject_distance: Option<f64>,
    /// Distance from the camera to the nearest detected plane.
    pub clearance: Option<f64>,
}

/// One sample of all four condition axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentConditions {
    /// Sample time.
    pub timestamp: Timestamp,
    /// Lighting axis.
    pub lighting: LightingCondition,
    /// Motion axis.
    pub motion: MotionCondition,
    /// Surface axis.
    pub surface: SurfaceCondition,
    /// Space axis.
    pub space: SpaceCondition,
}

impl EnvironmentConditions {
    /// Per-axis change from `previous` to `self`.
    ///
    /// Lighting is the relative intensity change, motion the absolute change
    /// in linear plus angular speed, surface the largest change of its three
    /// terms and space the change in subject distance (meters).
    #[must_use]
    pub fn delta(&self, previous: &Self) -> ConditionDelta {
        let a = previous.lighting.ambient_intensity;
        let b = self.lighting.ambient_intensity;
        let lighting = (b - a).abs() / a.abs().max(b.abs()).max(1.0);

        let motion = (self.motion.linear_speed - previous.motion.linear_speed).abs()
            + (self.motion.angular_speed - previous.motion.angular_speed).abs();

        let surface = (self.surface.reflectivity - previous.surface.reflectivity)
            .abs()
            .max((self.surface.texture - previous.surface.texture).abs().min(1.0))
            .max((self.surface.roughness - previous.surface.roughness).abs());

        let space = match (self.space.subject_distance, previous.space.subject_distance) {
            (Some(now), Some(before)) => (now - before).abs(),
            _ => 0.0,
        };

        ConditionDelta {
            lighting,
            motion,
            surface,
            space,
        }
    }
}

/// Change between two condition samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionDelta {
    /// Relative lighting change.
    pub lighting: f64,
    /// Motion change.
    pub motion: f64,
    /// Surface change.
    pub surface: f64,
    /// Space change in meters.
    pub space: f64,
}

impl ConditionDelta {
    /// Largest axis change.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.lighting
            .max(self.motion)
            .max(self.surface)
            .max(self.space)
    }

    /// Whether any axis exceeds `threshold`.
    #[must_use]
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.max() > threshold
    }
}

/// Measured output quality of the reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Vertices per square meter.
    pub point_density: f64,
    /// Share of the expected surface that was captured, `[0, 1]`.
    pub surface_completeness: f64,
    /// Residual noise, `[0, 1]` (lower is better).
    pub noise_level: f64,
    /// Share of sharp features that survived processing, `[0, 1]`.
    pub feature_preservation: f64,
}

impl Default for QualityMetrics {
    fn default() -> Self {
        Self {
            point_density: 0.0,
            surface_completeness: 0.0,
            noise_level: 1.0,
            feature_preservation: 0.0,
        }
    }
}

impl QualityMetrics {
    /// Scores the metrics in `[0, 1]` against a target density.
    #[must_use]
    pub fn score(&self, target_density: f64) -> f64 {
        let density = if target_density > 0.0 {
            (self.point_density / target_density).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let s = (density
            + self.surface_completeness.clamp(0.0, 1.0)
            + (1.0 - self.noise_level.clamp(0.0, 1.0))
            + self.feature_preservation.clamp(0.0, 1.0))
            / 4.0;
        s.clamp(0.0, 1.0)
    }
}

/// Thresholds quality control applies to incoming geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityParameters {
    /// Minimum referenced vertices per square meter.
    pub min_vertex_density: f64,
    /// Minimum per-vertex sensor confidence for a vertex to count.
    pub min_confidence: f32,
    /// Maximum tolerated noise level.
    pub max_noise_level: f64,
    /// Minimum surface completeness.
    pub min_surface_completeness: f64,
}

impl Default for QualityParameters {
    fn default() -> Self {
        Self {
            min_vertex_density: 1000.0,
            min_confidence: 0.0,
            max_noise_level: 0.3,
            min_surface_completeness: 0.7,
        }
    }
}
