//! Property tests for parameter derivation and profile blending.

use proptest::prelude::*;
use scan_calibration::{derive_parameters, CalibrationParameters, EnvironmentType};
use scan_types::{EnvironmentConditions, QualityMetrics};

fn environment() -> impl Strategy<Value = EnvironmentType> {
    prop::sample::select(EnvironmentType::ALL.to_vec())
}

proptest! {
    #[test]
    fn derived_parameters_stay_bounded(
        env in environment(),
        lux in 0.0f64..50_000.0,
        blur in 0.0f64..0.5,
        texture in 0.0f64..2.0,
        roughness in 0.0f64..1.5,
        noise in 0.0f64..1.0,
        features in 0.0f64..1.0,
    ) {
        let baseline = CalibrationParameters::seeded(env);
        let mut conditions = EnvironmentConditions::default();
        conditions.lighting.ambient_intensity = lux;
        conditions.motion.blur = blur;
        conditions.surface.texture = texture;
        conditions.surface.roughness = roughness;
        let metrics = QualityMetrics {
            point_density: 1_000.0,
            surface_completeness: 0.8,
            noise_level: noise,
            feature_preservation: features,
        };

        let p = derive_parameters(&baseline, &conditions, &metrics);
        prop_assert!(p.scanning.exposure_bias.abs() <= 2.0);
        prop_assert!(p.scanning.max_linear_speed <= baseline.scanning.max_linear_speed);
        prop_assert!(p.scanning.capture_interval_ms <= baseline.scanning.capture_interval_ms);
        prop_assert!(p.processing.confidence_threshold <= 0.95);
        prop_assert!(p.processing.confidence_threshold >= baseline.processing.confidence_threshold);
        prop_assert!(p.processing.spatial_sigma <= 2.0 * baseline.processing.spatial_sigma + 1e-12);
        prop_assert!(p.processing.range_sigma <= 2.0 * baseline.processing.range_sigma + 1e-12);
    }

    #[test]
    fn blend_stays_between_endpoints(t in 0.0f64..=1.0) {
        let a = CalibrationParameters::seeded(EnvironmentType::Research);
        let b = CalibrationParameters::seeded(EnvironmentType::Medical);
        let mixed = a.blend(&b, t);
        let lo = a.scanning.target_vertex_density.min(b.scanning.target_vertex_density);
        let hi = a.scanning.target_vertex_density.max(b.scanning.target_vertex_density);
        prop_assert!(mixed.scanning.target_vertex_density >= lo - 1e-9);
        prop_assert!(mixed.scanning.target_vertex_density <= hi + 1e-9);
        prop_assert!(mixed.processing.spatial_sigma >= b.processing.spatial_sigma - 1e-12);
        prop_assert!(mixed.processing.spatial_sigma <= a.processing.spatial_sigma + 1e-12);
    }
}
