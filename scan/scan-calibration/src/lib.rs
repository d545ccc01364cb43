//! Environment analysis and adaptive calibration for scan capture.
//!
//! Two services share this crate:
//!
//! - [`EnvironmentAnalyzer`] measures lighting, motion, surface and space
//!   conditions from each frame, grades them against per-level
//!   [`EnvironmentThresholds`] and produces prioritized [`Recommendation`]s.
//!   Sessions can sample on a background thread from a [`FrameSource`].
//! - [`CalibrationManager`] derives capture and processing parameters from
//!   live conditions, applies them through a [`CalibrationTarget`] and folds
//!   the best result of each session into a per-environment profile.
//!
//! Seeded profiles:
//!
//! | Environment | Level | Vertex density | Max speed (m/s) |
//! |-------------|-------|----------------|-----------------|
//! | medical | medical | 5000 | 0.10 |
//! | dental | professional | 4000 | 0.08 |
//! | research | standard | 1500 | 0.25 |
//!
//! # Example
//!
//! ```
//! use scan_calibration::{EnvironmentAnalyzer, RecommendationKind};
//! use scan_types::{
//!     CameraState, EnvironmentSnapshot, LightEstimate, RequirementLevel, ScanFrame, ScanId,
//!     Timestamp,
//! };
//!
//! let analyzer = EnvironmentAnalyzer::default();
//! let ctx = analyzer.begin_analysis(ScanId(1), RequirementLevel::Medical, &EnvironmentSnapshot::default());
//!
//! let dim = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default()).with_light(LightEstimate {
//!     ambient_intensity: 150.0,
//!     color_temperature: 5000.0,
//! });
//! let assessment = analyzer.analyze_frame(ctx, &dim).unwrap();
//!
//! assert!(!assessment.suitable);
//! assert!(assessment.recommends(RecommendationKind::AdjustLighting));
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod analyzer;
mod assess;
mod error;
mod manager;
mod measure;
mod profile;
mod thresholds;

pub use analyzer::{EnvironmentAnalyzer, EnvironmentConfig, EnvironmentSample, FrameSource};
pub use assess::{assess, EnvironmentAssessment, Recommendation, RecommendationKind};
pub use error::{CalibrationError, CalibrationResult};
pub use manager::{
    derive_parameters, CalibrationConfig, CalibrationManager, CalibrationRecord, CalibrationTarget,
};
pub use measure::{
    fragment_roughness, lighting_condition, measure_conditions, motion_condition,
    space_condition, surface_condition, PreviousSample,
};
pub use profile::{
    CalibrationParameters, EnvironmentProfile, EnvironmentType, ProcessingParameters,
    ScanningParameters,
};
pub use thresholds::EnvironmentThresholds;
