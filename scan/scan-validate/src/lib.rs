//! Mesh quality validation for live scan fragments.
//!
//! [`MeshValidator::validate`] runs four independent checks concurrently and
//! folds them into one [`ValidationResult`]:
//!
//! | Check | Issues |
//! |-------|--------|
//! | Topology | non-manifold edges, holes, inconsistent orientation |
//! | Geometry | degenerate triangles, low vertex density, intersecting triangles |
//! | Connectivity | disconnected vertices, invalid face connectivity |
//! | Quality | poor triangle quality, excessive roughness |
//!
//! Every [`ValidationIssue`] carries a fixed [`Severity`](scan_types::Severity).
//! A result is valid iff no issue is `High` or worse. Each check's confidence
//! is `1 - Σ penalty` (low 0.05, medium 0.15, high 0.3, critical 0.5) clamped
//! to `[0, 1]`, and the result's confidence is their unweighted mean.
//!
//! Poor data is a result, not an error. Only fragments whose arrays cannot be
//! interpreted (non-finite coordinates, mismatched normal or confidence
//! counts) fail with [`ValidateError::MalformedFragment`].
//!
//! [`MeshValidator::validate_sequence`] additionally checks temporal and
//! spatial coherence between consecutive fragments.

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod adjacency;
mod checks;
mod config;
mod error;
mod intersect;
mod issue;
mod sequence;
mod validator;

pub use config::{SequenceParams, ValidationConfig};
pub use error::{ValidateError, ValidateResult};
pub use issue::{Check, CheckConfidence, ValidationIssue, ValidationResult, severity_penalty};
pub use sequence::{SequenceIssue, SequenceValidation};
pub use validator::{MeshValidator, ValidationContext};
