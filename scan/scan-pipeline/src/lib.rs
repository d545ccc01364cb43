//! The concurrent scan-quality pipeline.
//!
//! [`ScanPipeline`] owns one instance of every quality service and runs each
//! captured frame through them:
//!
//! | Stage | Service | Runs |
//! |-------|---------|------|
//! | admission | [`ResourceGovernor`](scan_governor::ResourceGovernor) | first, per frame |
//! | environment | [`EnvironmentAnalyzer`](scan_calibration::EnvironmentAnalyzer) | before the fan-out |
//! | validation | [`MeshValidator`](scan_validate::MeshValidator) | parallel, per fragment |
//! | accuracy | [`AccuracyVerifier`](scan_accuracy::AccuracyVerifier) | parallel with validation |
//! | collision | [`CollisionDetector`](scan_collision::CollisionDetector) | parallel with both |
//! | calibration | [`CalibrationManager`](scan_calibration::CalibrationManager) | after the fan-out |
//! | optimization | [`MeshOptimizer`](scan_optimize::MeshOptimizer) | accepted fragments only |
//!
//! Interruptions are handled by a per-scan monitor thread of the
//! [`RecoveryManager`](scan_recovery::RecoveryManager).
//!
//! Calibration and environment changes feed the validator's thresholds
//! through the quality-feedback seam. Analytics, audit, storage, the capture
//! stack and the geometry backend are supplied as [`Collaborators`].
//!
//! # Configuration
//!
//! [`PipelineConfig`] aggregates every component's settings and loads from
//! JSON, with missing sections defaulted.
//!
//! # Example
//!
//! ```
//! use scan_calibration::EnvironmentType;
//! use scan_pipeline::{Collaborators, PipelineConfig, ScanPipeline};
//! use scan_types::{
//!     CameraState, EnvironmentSnapshot, FragmentId, MeshFragment, Point3, ScanFrame, ScanId,
//!     Timestamp,
//! };
//!
//! let pipeline = ScanPipeline::new(PipelineConfig::headless(), Collaborators::default());
//! pipeline
//!     .begin_scan(ScanId(9), EnvironmentType::Medical, &EnvironmentSnapshot::default())
//!     .unwrap();
//!
//! let fragment = MeshFragment::new(
//!     FragmentId(1),
//!     Timestamp::from_secs(0.0),
//!     vec![
//!         Point3::new(0.0, 0.0, -0.5),
//!         Point3::new(0.01, 0.0, -0.5),
//!         Point3::new(0.0, 0.01, -0.5),
//!     ],
//!     vec![[0, 1, 2]],
//! );
//! let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default())
//!     .with_fragment(fragment);
//! let report = pipeline.process_frame(ScanId(9), &frame).unwrap();
//! assert_eq!(report.validations.len(), 1);
//!
//! let summary = pipeline.end_scan(ScanId(9)).unwrap();
//! assert_eq!(summary.profile.sessions_completed, 1);
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod collaborators;
mod config;
mod error;
mod metrics;
mod pipeline;

pub use collaborators::Collaborators;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use metrics::frame_metrics;
pub use pipeline::{FrameReport, ScanPipeline, ScanSummary};
