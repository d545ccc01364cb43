//! Tiered simplification of scan fragments.
//!
//! Fragments above a vertex ceiling (10,000 by default) are decimated with
//! quadric-error edge collapse and then Laplacian-smoothed, both on the same
//! [`GeometryBackend`]:
//!
//! | Tier | Faces removed | Smoothing passes |
//! |------|---------------|------------------|
//! | high | 20% | 1 |
//! | medium | 40% | 2 |
//! | low | 60% | 3 |
//!
//! Smaller fragments pass through unchanged with zero optimization time.
//! [`MeshOptimizer::batch_optimize`] runs fragments in parallel and reports
//! each result independently.
//!
//! The passes are also available as plain functions: [`decimate`] and
//! [`laplacian_smooth`].

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod backend;
mod config;
mod decimate;
mod error;
mod optimizer;
mod quadric;
mod smooth;
mod tier;

pub use backend::{CpuBackend, GeometryBackend};
pub use config::OptimizerConfig;
pub use decimate::{decimate, Decimation};
pub use error::{OptimizeError, OptimizeResult};
pub use optimizer::{MeshOptimizer, OptimizedMesh};
pub use quadric::Quadric;
pub use smooth::laplacian_smooth;
pub use tier::QualityTier;
