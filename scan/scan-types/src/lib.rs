//! Shared data types for the live scan-quality pipeline.
//!
//! Every analyzer crate speaks in terms of the records defined here:
//!
//! - [`MeshFragment`] - A captured piece of surface geometry with its transform
//! - [`ScanFrame`] - Everything the capture loop delivers for one frame
//! - [`Severity`] - Ordinal classification shared by issues and collisions
//! - [`ScanId`], [`FragmentId`], [`ContextId`] - Identity records
//! - [`EnvironmentConditions`] - Lighting/motion/surface/space snapshot
//! - [`QualityMetrics`], [`QualityParameters`] - Quality-control vocabulary
//! - [`Aabb`] - Axis-aligned box used for bounds and safety zones
//! - [`EnvironmentSnapshot`], [`RequirementLevel`] - Session start parameters
//!
//! The collaborator traits ([`AnalyticsSink`], [`AuditSink`], [`SecureStorage`],
//! [`QualityFeedback`], [`ScanSessionHook`]) describe the outward-facing seams.
//! In-memory implementations are provided for tests and headless runs.
//!
//! # Units
//!
//! Positions are meters, time is seconds on the capture clock.
//!
//! # Coordinate System
//!
//! Right-handed, Y up. Cameras look down their local -Z axis.
//!
//! # Example
//!
//! ```
//! use nalgebra::Point3;
//! use scan_types::{FragmentId, MeshFragment, Timestamp};
//!
//! let fragment = MeshFragment::new(
//!     FragmentId(1),
//!     Timestamp::from_secs(0.0),
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(0.01, 0.0, 0.0),
//!         Point3::new(0.0, 0.01, 0.0),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//!
//! assert_eq!(fragment.face_count(), 1);
//! assert!((fragment.surface_area() - 0.00005).abs() < 1e-12);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod bounds;
mod collab;
mod conditions;
mod error;
mod fragment;
mod frame;
mod ids;
mod level;
mod severity;
mod snapshot;
mod time;

pub use bounds::Aabb;
pub use collab::{
    AnalyticsEvent, AnalyticsSink, AuditRecord, AuditSink, MemoryAnalytics, MemoryAuditLog,
    MemoryStorage, NoopAnalytics, QualityFeedback, RecordingFeedback, ScanSessionHook,
    SecureStorage,
};
pub use conditions::{
    ConditionDelta, EnvironmentConditions, LightingCondition, MotionCondition, QualityMetrics,
    QualityParameters, SpaceCondition, SurfaceCondition,
};
pub use error::{CollaboratorError, CollaboratorResult};
pub use fragment::{MeshFragment, triangle_area};
pub use frame::{
    CameraIntrinsics, CameraState, LightEstimate, LimitedReason, PlaneAnchor, ScanFrame,
    TrackingState, pose_rotation_angle, pose_translation,
};
pub use ids::{ContextId, FragmentId, ScanId};
pub use level::RequirementLevel;
pub use severity::Severity;
pub use snapshot::EnvironmentSnapshot;
pub use time::Timestamp;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};
