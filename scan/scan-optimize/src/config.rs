//! Optimizer configuration.

use serde::{Deserialize, Serialize};

/// Settings for [`MeshOptimizer`](crate::MeshOptimizer) and [`CpuBackend`](crate::CpuBackend).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Fragments with at most this many vertices are returned untouched.
    pub vertex_ceiling: usize,
    /// Laplacian step toward the neighbor centroid, `(0, 1]`.
    pub smoothing_lambda: f64,
    /// Keep open-boundary vertices fixed in both passes.
    pub preserve_boundary: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            vertex_ceiling: 10_000,
            smoothing_lambda: 0.5,
            preserve_boundary: true,
        }
    }
}

impl OptimizerConfig {
    /// Sets the vertex ceiling.
    #[must_use]
    pub const fn with_vertex_ceiling(mut self, ceiling: usize) -> Self {
        self.vertex_ceiling = ceiling;
        self
    }

    /// Sets the smoothing step.
    #[must_use]
    pub const fn with_smoothing_lambda(mut self, lambda: f64) -> Self {
        self.smoothing_lambda = lambda;
        self
    }
}
