//! Per-frame capture records.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Aabb, MeshFragment, Timestamp};

/// Camera intrinsic parameters (pinhole model, no distortion).
///
/// ```text
/// u = fx * X/Z + cx
/// v = fy * Y/Z + cy
/// ```
///
/// with `Z` the depth in front of the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in pixels (x direction).
    pub fx: f64,
    /// Focal length in pixels (y direction).
    pub fy: f64,
    /// Principal point x-coordinate in pixels.
    pub cx: f64,
    /// Principal point y-coordinate in pixels.
    pub cy: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl CameraIntrinsics {
    /// Creates new intrinsics.
    #[must_use]
    pub const fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Projects a camera-space point (camera looks down -Z) to pixel coordinates.
    ///
    /// Returns `None` for points behind the camera or outside the image.
    #[must_use]
    pub fn project(&self, p_cam: &Point3<f64>) -> Option<(f64, f64)> {
        let depth = -p_cam.z;
        if depth <= f64::EPSILON {
            return None;
        }
        let u = self.fx * p_cam.x / depth + self.cx;
        let v = self.fy * -p_cam.y / depth + self.cy;
        let inside =
            u >= 0.0 && v >= 0.0 && u < f64::from(self.width) && v < f64::from(self.height);
        inside.then_some((u, v))
    }
}

impl Default for CameraIntrinsics {
    /// A 1920x1440 sensor with a 1500 px focal length.
    fn default() -> Self {
        Self::new(1500.0, 1500.0, 960.0, 720.0, 1920, 1440)
    }
}

/// Why tracking is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitedReason {
    /// The session is still initializing.
    Initializing,
    /// The device is moving too fast.
    ExcessiveMotion,
    /// The scene lacks visual features.
    InsufficientFeatures,
    /// The session is relocalizing after an interruption.
    Relocalizing,
}

/// Sensor tracking quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingState {
    /// Tracking is reliable.
    #[default]
    Normal,
    /// Tracking is available but degraded.
    Limited(LimitedReason),
    /// No tracking.
    NotAvailable,
}

impl TrackingState {
    /// Returns true for [`TrackingState::Normal`].
    #[must_use]
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Normal)
    }
}

/// Camera pose, intrinsics and tracking for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraState {
    /// Camera-to-world transform.
    pub pose: Matrix4<f64>,
    /// Intrinsics.
    pub intrinsics: CameraIntrinsics,
    /// Tracking quality.
    pub tracking: TrackingState,
    /// Exposure duration in seconds.
    pub exposure_duration: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            pose: Matrix4::identity(),
            intrinsics: CameraIntrinsics::default(),
            tracking: TrackingState::Normal,
            exposure_duration: 1.0 / 60.0,
        }
    }
}

impl CameraState {
    /// Camera state at `position` with identity orientation.
    #[must_use]
    pub fn at(position: Point3<f64>) -> Self {
        Self {
            pose: Matrix4::new_translation(&position.coords),
            ..Self::default()
        }
    }

    /// World-space camera position.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        Point3::from(pose_translation(&self.pose))
    }

    /// World-space viewing direction (-Z of the camera frame).
    #[must_use]
    pub fn forward(&self) -> Vector3<f64> {
        -Vector3::new(self.pose[(0, 2)], self.pose[(1, 2)], self.pose[(2, 2)])
    }

    /// Maps a world point into the camera frame.
    ///
    /// Returns `None` when the pose is singular.
    #[must_use]
    pub fn world_to_camera(&self, p: &Point3<f64>) -> Option<Point3<f64>> {
        self.pose.try_inverse().map(|inv| inv.transform_point(p))
    }
}

/// A detected planar surface (floor, wall, table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneAnchor {
    /// Sensor-assigned anchor id.
    pub id: u64,
    /// World-space center.
    pub center: Point3<f64>,
    /// Half extents of the plane's bounds.
    pub half_extents: Vector3<f64>,
    /// Unit normal.
    pub normal: Vector3<f64>,
}

impl PlaneAnchor {
    /// World-space bounds of the plane.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.center, self.half_extents)
    }
}

/// Scene light estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightEstimate {
    /// Ambient intensity in lux.
    pub ambient_intensity: f64,
    /// Ambient color temperature in kelvin.
    pub color_temperature: f64,
}

/// Everything the capture loop delivers for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanFrame {
    /// Capture time.
    pub timestamp: Timestamp,
    /// Camera record.
    pub camera: CameraState,
    /// Mesh fragments updated in this frame.
    pub fragments: Vec<MeshFragment>,
    /// Raw feature-point cloud, in world space.
    pub feature_points: Option<Vec<Point3<f64>>>,
    /// Detected planes.
    pub planes: Vec<PlaneAnchor>,
    /// Light estimate, when available.
    pub light: Option<LightEstimate>,
}

impl ScanFrame {
    /// Creates an empty frame with the given camera.
    #[must_use]
    pub fn new(timestamp: Timestamp, camera: CameraState) -> Self {
        Self {
            timestamp,
            camera,
            fragments: Vec::new(),
            feature_points: None,
            planes: Vec::new(),
            light: None,
        }
    }

    /// Adds a fragment.
    #[must_use]
    pub fn with_fragment(mut self, fragment: MeshFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Sets the feature-point cloud.
    #[must_use]
    pub fn with_feature_points(mut self, points: Vec<Point3<f64>>) -> Self {
        self.feature_points = Some(points);
        self
    }

    /// Adds a plane anchor.
    #[must_use]
    pub fn with_plane(mut self, plane: PlaneAnchor) -> Self {
        self.planes.push(plane);
        self
    }

    /// Sets the light estimate.
    #[must_use]
    pub fn with_light(mut self, light: LightEstimate) -> Self {
        self.light = Some(light);
        self
    }

    /// Feature points, or an empty slice.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        self.feature_points.as_deref().unwrap_or(&[])
    }

    /// Total vertex count over all fragments.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.fragments.iter().map(MeshFragment::vertex_count).sum()
    }
}

/// Translation part of a homogeneous transform.
#[must_use]
pub fn pose_translation(pose: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(pose[(0, 3)], pose[(1, 3)], pose[(2, 3)])
}

/// Angle in radians of the relative rotation between two poses.
#[must_use]
pub fn pose_rotation_angle(a: &Matrix4<f64>, b: &Matrix4<f64>) -> f64 {
    let ra: Matrix3<f64> = a.fixed_view::<3, 3>(0, 0).into_owned();
    let rb: Matrix3<f64> = b.fixed_view::<3, 3>(0, 0).into_owned();
    let relative = ra.transpose() * rb;
    ((relative.trace() - 1.0) * 0.5).clamp(-1.0, 1.0).acos()
}
