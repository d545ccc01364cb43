//! Accuracy targets per requirement level.

use scan_types::RequirementLevel;
use serde::{Deserialize, Serialize};

/// Targets a scan session is measured against.
///
/// # Example
///
/// ```
/// use scan_accuracy::AccuracyRequirements;
/// use scan_types::RequirementLevel;
///
/// let medical = AccuracyRequirements::for_level(RequirementLevel::Medical);
/// let basic = AccuracyRequirements::for_level(RequirementLevel::Basic);
/// assert!(medical.target_vertex_density > basic.target_vertex_density);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyRequirements {
    /// Level these targets were derived from.
    pub level: RequirementLevel,
    /// Vertices per m² that score full marks.
    pub target_vertex_density: f64,
    /// Fragment area (m²) that scores full marks.
    pub target_surface_area: f64,
    /// Feature points per image pixel that score full marks.
    pub target_point_ratio: f64,
    /// Mean scale error that scores zero.
    pub scale_tolerance: f64,
    /// Minimum mean mesh quality.
    pub min_mesh_quality: f64,
    /// Minimum mean feature accuracy.
    pub min_feature_accuracy: f64,
    /// Minimum mean scale accuracy.
    pub min_scale_accuracy: f64,
    /// Per-sample change in overall score that counts as a trend.
    pub trend_threshold: f64,
    /// Mesh-quality variance above which the mesh is inconsistent.
    pub max_quality_variance: f64,
}

impl Default for AccuracyRequirements {
    fn default() -> Self {
        Self::for_level(RequirementLevel::Standard)
    }
}

impl AccuracyRequirements {
    /// Preset for a requirement level.
    #[must_use]
    pub const fn for_level(level: RequirementLevel) -> Self {
        let (density, area, ratio, tolerance, mesh, feature, scale) = match level {
            RequirementLevel::Basic => (500.0, 0.005, 2e-5, 0.05, 0.4, 0.3, 0.5),
            RequirementLevel::Standard => (1_000.0, 0.01, 5e-5, 0.03, 0.5, 0.4, 0.6),
            RequirementLevel::Professional => (2_500.0, 0.02, 1e-4, 0.02, 0.6, 0.5, 0.7),
            RequirementLevel::Medical => (5_000.0, 0.03, 2e-4, 0.01, 0.7, 0.6, 0.8),
        };
        Self {
            level,
            target_vertex_density: density,
            target_surface_area: area,
            target_point_ratio: ratio,
            scale_tolerance: tolerance,
            min_mesh_quality: mesh,
            min_feature_accuracy: feature,
            min_scale_accuracy: scale,
            trend_threshold: 0.01,
            max_quality_variance: 0.04,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stricter_levels_demand_more() {
        for pair in RequirementLevel::ALL.windows(2) {
            let (lo, hi) = (
                AccuracyRequirements::for_level(pair[0]),
                AccuracyRequirements::for_level(pair[1]),
            );
            assert!(hi.target_vertex_density > lo.target_vertex_density);
            assert!(hi.min_mesh_quality > lo.min_mesh_quality);
            assert!(hi.scale_tolerance < lo.scale_tolerance);
        }
    }

    #[test]
    fn json_level_name() {
        let req: AccuracyRequirements = serde_json::from_str(r#"{"level": "medical"}"#).unwrap();
        assert_eq!(req.level, RequirementLevel::Medical);
    }
}
