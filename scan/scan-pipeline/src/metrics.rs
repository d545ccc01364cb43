//! Per-frame quality metrics fed into calibration.

use scan_accuracy::AccuracyMeasurement;
use scan_types::{QualityMetrics, ScanFrame};
use scan_validate::ValidationResult;

/// Summarizes one processed frame for the calibration loop.
///
/// - `point_density`: frame vertices per square meter of captured surface
/// - `surface_completeness`: mean connectivity confidence of the fragments
/// - `noise_level`: one minus the mean geometry confidence
/// - `feature_preservation`: the frame's feature accuracy
///
/// A frame without fragments reports no density, no completeness and full noise.
#[must_use]
pub fn frame_metrics(
    frame: &ScanFrame,
    validations: &[ValidationResult],
    measurement: &AccuracyMeasurement,
) -> QualityMetrics {
    let area: f64 = frame.fragments.iter().map(|f| f.surface_area()).sum();
    let point_density = if area > 0.0 {
        frame.vertex_count() as f64 / area
    } else {
        0.0
    };

    if validations.is_empty() {
        return QualityMetrics {
            point_density,
            feature_preservation: measurement.feature_accuracy,
            ..QualityMetrics::default()
        };
    }

    let n = validations.len() as f64;
    let connectivity = validations.iter().map(|v| v.checks.connectivity).sum::<f64>() / n;
    let geometry = validations.iter().map(|v| v.checks.geometry).sum::<f64>() / n;
    QualityMetrics {
        point_density,
        surface_completeness: connectivity.clamp(0.0, 1.0),
        noise_level: (1.0 - geometry).clamp(0.0, 1.0),
        feature_preservation: measurement.feature_accuracy.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scan_accuracy::{AccuracyRequirements, measure_frame};
    use scan_types::{
        CameraState, EnvironmentConditions, FragmentId, MeshFragment, Point3, ScanId, Timestamp,
    };
    use scan_validate::{MeshValidator, ValidationContext};

    fn square_frame() -> ScanFrame {
        let fragment = MeshFragment::new(
            FragmentId(1),
            Timestamp::from_secs(0.0),
            vec![
                Point3::new(0.0, 0.0, -1.0),
                Point3::new(0.1, 0.0, -1.0),
                Point3::new(0.1, 0.1, -1.0),
                Point3::new(0.0, 0.1, -1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        );
        ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default()).with_fragment(fragment)
    }

    #[test]
    fn density_is_vertices_per_area() {
        let frame = square_frame();
        let measurement = measure_frame(
            &frame,
            &AccuracyRequirements::default(),
            EnvironmentConditions::default(),
        );
        let validator = MeshValidator::default();
        let ctx = ValidationContext::new(ScanId(1));
        let results = vec![validator.validate(&frame.fragments[0], &ctx).unwrap()];

        let metrics = frame_metrics(&frame, &results, &measurement);
        assert_relative_eq!(metrics.point_density, 4.0 / 0.01, max_relative = 1e-9);
        assert!((0.0..=1.0).contains(&metrics.surface_completeness));
        assert!((0.0..=1.0).contains(&metrics.noise_level));
    }

    #[test]
    fn empty_frame_is_worst_case() {
        let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default());
        let measurement = measure_frame(
            &frame,
            &AccuracyRequirements::default(),
            EnvironmentConditions::default(),
        );
        let metrics = frame_metrics(&frame, &[], &measurement);
        assert_eq!(metrics.point_density, 0.0);
        assert_eq!(metrics.surface_completeness, 0.0);
        assert_eq!(metrics.noise_level, 1.0);
    }
}
