//! Scan accuracy verification.
//!
//! Each verification session owns a bounded history of per-frame
//! [`AccuracyMeasurement`]s. A measurement combines three scores computed
//! concurrently:
//!
//! | Score | Inputs |
//! |-------|--------|
//! | mesh quality | vertex density and surface area per fragment |
//! | feature accuracy | feature points per pixel, spread over the image |
//! | scale accuracy | fragment transform scale error |
//!
//! [`AccuracyAnalysis`] turns the history into a [`Trend`], flagged
//! [`ProblemArea`]s and prioritized [`ImprovementStrategy`]s.
//!
//! # Example
//!
//! ```
//! use scan_accuracy::{AccuracyRequirements, AccuracyVerifier, Trend};
//! use scan_types::{EnvironmentSnapshot, RequirementLevel, ScanId};
//!
//! let verifier = AccuracyVerifier::default();
//! let requirements = AccuracyRequirements::for_level(RequirementLevel::Professional);
//! let ctx = verifier
//!     .begin_verification(ScanId(7), requirements, &EnvironmentSnapshot::default())
//!     .unwrap();
//!
//! let analysis = verifier.analyze_accuracy(ctx).unwrap();
//! assert_eq!(analysis.trend, Trend::Stable { variance: 0.0 });
//! ```

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod analysis;
mod config;
mod error;
mod measure;
mod requirements;
mod verifier;

pub use analysis::{AccuracyAnalysis, ImprovementStrategy, ProblemArea, ProblemKind, Trend};
pub use config::AccuracyConfig;
pub use error::{AccuracyError, AccuracyResult};
pub use measure::{
    feature_accuracy, feature_distribution, measure_frame, mesh_quality, scale_accuracy,
    AccuracyMeasurement, DISTRIBUTION_GRID,
};
pub use requirements::AccuracyRequirements;
pub use verifier::{AccuracyVerifier, VerificationInfo};
