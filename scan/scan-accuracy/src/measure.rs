//! Per-frame accuracy measurements.
//!
//! Three independent scores in `[0, 1]`:
//!
//! - **mesh quality**: per fragment `0.5·min(density/target, 1) +
//!   0.5·min(area/target, 1)`, averaged over the frame's fragments
//! - **feature accuracy**: `0.5·min(points/pixels / target_ratio, 1) +
//!   0.5·coverage`, where coverage is the share of occupied cells in a 4×4
//!   grid over the image after projecting the feature points
//! - **scale accuracy**: `1 - mean|scale - 1| / tolerance`, clamped

use scan_types::{CameraState, EnvironmentConditions, MeshFragment, Point3, ScanFrame, Timestamp};
use serde::{Deserialize, Serialize};

use crate::AccuracyRequirements;

/// Cells per image axis used by the feature distribution metric.
pub const DISTRIBUTION_GRID: usize = 4;

/// One accuracy sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMeasurement {
    /// Frame timestamp.
    pub timestamp: Timestamp,
    /// Mesh quality score.
    pub mesh_quality: f64,
    /// Feature accuracy score.
    pub feature_accuracy: f64,
    /// Scale accuracy score.
    pub scale_accuracy: f64,
    /// Mean of the three scores.
    pub overall: f64,
    /// Environment conditions when the frame was measured.
    pub conditions: EnvironmentConditions,
}

/// Measures one frame, computing the three scores concurrently.
#[must_use]
pub fn measure_frame(
    frame: &ScanFrame,
    requirements: &AccuracyRequirements,
    conditions: EnvironmentConditions,
) -> AccuracyMeasurement {
    let (mesh_quality, (feature_accuracy, scale_accuracy)) = rayon::join(
        || mesh_quality(&frame.fragments, requirements),
        || {
            rayon::join(
                || feature_accuracy(frame.points(), &frame.camera, requirements),
                || scale_accuracy(&frame.fragments, requirements.scale_tolerance),
            )
        },
    );
    AccuracyMeasurement {
        timestamp: frame.timestamp,
        mesh_quality,
        feature_accuracy,
        scale_accuracy,
        overall: (mesh_quality + feature_accuracy + scale_accuracy) / 3.0,
        conditions,
    }
}

/// Mean per-fragment density/area score. Zero for an empty frame.
#[must_use]
pub fn mesh_quality(fragments: &[MeshFragment], requirements: &AccuracyRequirements) -> f64 {
    if fragments.is_empty() {
        return 0.0;
    }
    let total: f64 = fragments
        .iter()
        .map(|f| {
            let area = f.surface_area();
            #[allow(clippy::cast_precision_loss)]
            let density = if area > 0.0 {
                f.referenced_vertex_count() as f64 / area
            } else {
                0.0
            };
            0.5 * ratio(density, requirements.target_vertex_density)
                + 0.5 * ratio(area, requirements.target_surface_area)
        })
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let n = fragments.len() as f64;
    total / n
}

/// Point-count and image-coverage score. Zero without feature points.
#[must_use]
pub fn feature_accuracy(
    points: &[Point3<f64>],
    camera: &CameraState,
    requirements: &AccuracyRequirements,
) -> f64 {
    let pixels = camera.intrinsics.pixel_count();
    if points.is_empty() || pixels == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let point_ratio = points.len() as f64 / pixels as f64;
    0.5 * ratio(point_ratio, requirements.target_point_ratio)
        + 0.5 * feature_distribution(points, camera)
}

/// Share of occupied cells in a [`DISTRIBUTION_GRID`]² grid over the image.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn feature_distribution(points: &[Point3<f64>], camera: &CameraState) -> f64 {
    let intr = &camera.intrinsics;
    if intr.width == 0 || intr.height == 0 {
        return 0.0;
    }
    let Some(inverse) = camera.pose.try_inverse() else {
        return 0.0;
    };

    let mut occupied = [[false; DISTRIBUTION_GRID]; DISTRIBUTION_GRID];
    let cell_w = f64::from(intr.width) / DISTRIBUTION_GRID as f64;
    let cell_h = f64::from(intr.height) / DISTRIBUTION_GRID as f64;
    for p in points {
        let local = inverse.transform_point(p);
        if let Some((u, v)) = intr.project(&local) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (cx, cy) = ((u / cell_w) as usize, (v / cell_h) as usize);
            occupied[cy.min(DISTRIBUTION_GRID - 1)][cx.min(DISTRIBUTION_GRID - 1)] = true;
        }
    }

    let filled = occupied.iter().flatten().filter(|&&o| o).count();
    filled as f64 / (DISTRIBUTION_GRID * DISTRIBUTION_GRID) as f64
}

/// Scale score from the fragments' transform scale factors. Zero without fragments.
#[must_use]
pub fn scale_accuracy(fragments: &[MeshFragment], tolerance: f64) -> f64 {
    if fragments.is_empty() || tolerance <= 0.0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = fragments.len() as f64;
    let mean_error = fragments
        .iter()
        .map(|f| (f.scale_factor() - 1.0).abs())
        .sum::<f64>()
        / n;
    (1.0 - mean_error / tolerance).clamp(0.0, 1.0)
}

fn ratio(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        1.0
    } else {
        (value / target).clamp(0.0, 1.0)
    }
}
