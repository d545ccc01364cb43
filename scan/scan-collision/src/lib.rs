//! Real-time collision and safety detection for handheld scanning.
//!
//! Each session keeps an obstacle map fed from two sources:
//!
//! - **Plane anchors** reported by the tracker become plane obstacles
//! - **Feature points** are bucketed into voxels and grouped into 26-connected
//!   clusters; clusters that move between frames turn dynamic
//!
//! Obstacles not re-observed within a second are dropped. Every update tests
//! the device position against each obstacle's fixed threshold:
//!
//! | Kind | Threshold (m) |
//! |------|---------------|
//! | plane | 0.3 |
//! | point cloud | 0.2 |
//! | safety zone | 0.5 |
//! | dynamic | 0.4 |
//!
//! and against the static safety zones. When anything is hit, the
//! highest-severity collision yields a [`MovementGuidance`] direction that
//! stays inside the required zones.
//!
//! # Example
//!
//! ```
//! use scan_collision::{CollisionDetector, ObstacleKind};
//! use scan_types::{CameraState, EnvironmentSnapshot, PlaneAnchor, Point3, ScanFrame, ScanId, Timestamp, Vector3};
//!
//! let detector = CollisionDetector::default();
//! let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
//!
//! let wall = PlaneAnchor {
//!     id: 3,
//!     center: Point3::new(0.25, 0.0, 0.0),
//!     half_extents: Vector3::new(0.0, 1.0, 1.0),
//!     normal: -Vector3::x(),
//! };
//! let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default()).with_plane(wall);
//! let update = detector.update_scan(ctx, &frame).unwrap();
//!
//! assert_eq!(update.collisions[0].kind, ObstacleKind::Plane);
//! assert!(update.guidance.unwrap().direction.x < 0.0);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod detector;
mod error;
mod guidance;
mod obstacle;
mod settings;
pub mod voxel;
mod zone;

pub use detector::{CollisionDetector, CollisionUpdate};
pub use error::{CollisionError, CollisionResult};
pub use guidance::{
    check_position, collision_severity, movement_guidance, test_obstacle, Collision,
    MovementGuidance,
};
pub use obstacle::{Obstacle, ObstacleId, ObstacleKind, ObstacleMap, ObstacleSource};
pub use settings::CollisionSettings;
pub use zone::{SafetyZone, ZoneKind, ZoneViolation};
