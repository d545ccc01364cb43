//! Condition extraction from a captured frame.
//!
//! The four axes are computed independently in a fixed fan-out and combined
//! into one [`EnvironmentConditions`] sample.

use scan_types::{
    pose_rotation_angle, CameraState, EnvironmentConditions, LightingCondition, MeshFragment,
    MotionCondition, ScanFrame, SpaceCondition, SurfaceCondition, Timestamp, Vector3,
};

/// Light level treated as fully reflective by the reflectivity proxy.
const REFLECTIVITY_SATURATION_LUX: f64 = 2_000.0;

/// Camera record of the previous sample, used for motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviousSample {
    /// When it was taken.
    pub timestamp: Timestamp,
    /// Camera at that time.
    pub camera: CameraState,
}

/// Extracts all four condition axes from `frame`.
///
/// Axes the frame carries no data for keep the values from `fallback`.
#[must_use]
pub fn measure_conditions(
    frame: &ScanFrame,
    previous: Option<&PreviousSample>,
    fallback: &EnvironmentConditions,
) -> EnvironmentConditions {
    let ((lighting, motion), (surface, space)) = rayon::join(
        || {
            rayon::join(
                || lighting_condition(frame, &fallback.lighting),
                || motion_condition(frame, previous),
            )
        },
        || {
            rayon::join(
                || surface_condition(frame, &fallback.surface),
                || space_condition(frame),
            )
        },
    );
    EnvironmentConditions {
        timestamp: frame.timestamp,
        lighting,
        motion,
        surface,
        space,
    }
}

/// Lighting from the frame's light estimate.
#[must_use]
pub fn lighting_condition(frame: &ScanFrame, fallback: &LightingCondition) -> LightingCondition {
    frame.light.map_or(*fallback, |light| LightingCondition {
        ambient_intensity: light.ambient_intensity,
        color_temperature: light.color_temperature,
    })
}

/// Linear and angular speed between the previous and current camera.
///
/// Blur is the angle swept during one exposure.
#[must_use]
pub fn motion_condition(frame: &ScanFrame, previous: Option<&PreviousSample>) -> MotionCondition {
    let tracking = frame.camera.tracking;
    let Some(prev) = previous else {
        return MotionCondition {
            tracking,
            ..MotionCondition::default()
        };
    };
    let dt = frame.timestamp.seconds_since(prev.timestamp);
    if dt <= f64::EPSILON {
        return MotionCondition {
            tracking,
            ..MotionCondition::default()
        };
    }
    let linear_speed = (frame.camera.position() - prev.camera.position()).norm() / dt;
    let angular_speed = pose_rotation_angle(&prev.camera.pose, &frame.camera.pose) / dt;
    MotionCondition {
        linear_speed,
        angular_speed,
        blur: angular_speed * frame.camera.exposure_duration,
        tracking,
    }
}

/// Surface reflectivity, texture and roughness.
#[must_use]
pub fn surface_condition(frame: &ScanFrame, fallback: &SurfaceCondition) -> SurfaceCondition {
    let reflectivity = frame.light.map_or(fallback.reflectivity, |light| {
        (light.ambient_intensity / REFLECTIVITY_SATURATION_LUX).clamp(0.0, 1.0)
    });

    let vertices = frame.vertex_count();
    #[allow(clippy::cast_precision_loss)]
    let texture = if vertices == 0 {
        fallback.texture
    } else {
        frame.points().len() as f64 / vertices as f64
    };

    let rough: Vec<f64> = frame.fragments.iter().filter_map(fragment_roughness).collect();
    let roughness = if rough.is_empty() {
        fallback.roughness
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = rough.len() as f64;
        rough.iter().sum::<f64>() / n
    };

    SurfaceCondition {
        reflectivity,
        texture,
        roughness,
    }
}

/// Mean angle between each face normal and the fragment's area-weighted normal.
#[must_use]
pub fn fragment_roughness(fragment: &MeshFragment) -> Option<f64> {
    let normals: Vec<(Vector3<f64>, f64)> = fragment
        .well_formed_faces()
        .filter_map(|(_, face)| {
            let n = fragment.face_normal(face)?;
            Some((n, fragment.face_area(face)))
        })
        .collect();
    let mean = normals
        .iter()
        .fold(Vector3::zeros(), |acc, (n, area)| acc + n * *area);
    if normals.is_empty() || mean.norm() <= f64::EPSILON {
        return None;
    }
    let mean = mean.normalize();
    #[allow(clippy::cast_precision_loss)]
    let count = normals.len() as f64;
    Some(
        normals
            .iter()
            .map(|(n, _)| n.dot(&mean).clamp(-1.0, 1.0).acos())
            .sum::<f64>()
            / count,
    )
}

/// Distance to the nearest fragment centroid and to the nearest plane.
#[must_use]
pub fn space_condition(frame: &ScanFrame) -> SpaceCondition {
    let camera = frame.camera.position();
    let subject_distance = frame
        .fragments
        .iter()
        .filter_map(MeshFragment::world_centroid)
        .map(|c| (c - camera).norm())
        .min_by(f64::total_cmp);
    let clearance = frame
        .planes
        .iter()
        .map(|p| p.bounds().distance_to(&camera))
        .min_by(f64::total_cmp);
    SpaceCondition {
        subject_distance,
        clearance,
    }
}
