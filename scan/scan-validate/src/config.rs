//! Validation thresholds.

use scan_types::QualityParameters;
use serde::{Deserialize, Serialize};

/// Thresholds for temporal and spatial coherence across a fragment sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceParams {
    /// Largest allowed gap between consecutive timestamps, seconds.
    pub max_frame_gap: f64,
    /// Largest allowed translation between consecutive transforms, meters.
    pub max_pose_translation: f64,
    /// Largest allowed rotation between consecutive transforms, radians.
    pub max_pose_rotation: f64,
    /// Largest allowed gap between consecutive world bounds, meters.
    pub max_registration_drift: f64,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            max_frame_gap: 0.5,
            max_pose_translation: 0.1,
            max_pose_rotation: 0.35,
            max_registration_drift: 0.05,
        }
    }
}

/// Mesh quality validator configuration.
///
/// # Example
///
/// ```
/// use scan_validate::ValidationConfig;
///
/// let config = ValidationConfig::strict();
/// assert!(config.min_vertex_density > ValidationConfig::default().min_vertex_density);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Faces with area below this (m²) are degenerate.
    pub degenerate_area_threshold: f64,
    /// Minimum referenced vertices per m².
    pub min_vertex_density: f64,
    /// Minimum per-vertex sensor confidence for a vertex to count toward density.
    pub min_confidence: f32,
    /// Triangles with quality `4√3·A / Σl²` below this are poor.
    pub min_triangle_quality: f64,
    /// Poor triangles are reported when their share exceeds this.
    pub poor_quality_ratio: f64,
    /// Mean dihedral deviation (radians) above which a surface is rough.
    pub max_roughness: f64,
    /// Tolerance for the exact triangle intersection test.
    pub intersection_epsilon: f64,
    /// Results kept per scan.
    pub history_capacity: usize,
    /// Sequence coherence thresholds.
    pub sequence: SequenceParams,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            degenerate_area_threshold: 1e-10,
            min_vertex_density: 1_000.0,
            min_confidence: 0.0,
            min_triangle_quality: 0.3,
            poor_quality_ratio: 0.2,
            max_roughness: 0.5,
            intersection_epsilon: 1e-9,
            history_capacity: 10,
            sequence: SequenceParams::default(),
        }
    }
}

impl ValidationConfig {
    /// Thresholds for clinical captures.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            min_vertex_density: 5_000.0,
            min_confidence: 0.5,
            min_triangle_quality: 0.4,
            poor_quality_ratio: 0.1,
            max_roughness: 0.35,
            ..Self::default()
        }
    }

    /// Thresholds for quick previews.
    #[must_use]
    pub fn lenient() -> Self {
        Self {
            min_vertex_density: 100.0,
            min_triangle_quality: 0.15,
            poor_quality_ratio: 0.4,
            max_roughness: 0.8,
            ..Self::default()
        }
    }

    /// Config with density and confidence thresholds taken from `params`.
    #[must_use]
    pub fn with_quality(mut self, params: &QualityParameters) -> Self {
        self.min_vertex_density = params.min_vertex_density;
        self.min_confidence = params.min_confidence;
        self
    }
}
