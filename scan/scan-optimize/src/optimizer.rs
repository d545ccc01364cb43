//! Tiered fragment optimization.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use scan_types::{FragmentId, MeshFragment};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    CpuBackend, GeometryBackend, OptimizeError, OptimizeResult, OptimizerConfig, QualityTier,
};

/// An optimized fragment with before/after statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedMesh {
    /// Resulting geometry.
    pub fragment: MeshFragment,
    /// Tier that was requested.
    pub tier: QualityTier,
    /// Vertex count before optimization.
    pub original_vertex_count: usize,
    /// Face count before optimization.
    pub original_face_count: usize,
    /// Wall time spent in the backend. Zero when the fragment was under the ceiling.
    pub optimization_time: Duration,
    /// Whether the passes ran.
    pub decimated: bool,
}

impl OptimizedMesh {
    /// Share of vertices removed, `[0, 1]`.
    #[must_use]
    pub fn vertex_reduction(&self) -> f64 {
        if self.original_vertex_count == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.fragment.vertex_count() as f64 / self.original_vertex_count as f64;
        (1.0 - ratio).clamp(0.0, 1.0)
    }
}

/// Decimates then smooths fragments above the vertex ceiling.
///
/// # Example
///
/// ```
/// use scan_optimize::{MeshOptimizer, QualityTier};
/// use scan_types::{FragmentId, MeshFragment, Point3, Timestamp};
///
/// let small = MeshFragment::new(
///     FragmentId(1),
///     Timestamp::from_secs(0.0),
///     vec![Point3::origin(), Point3::new(0.01, 0.0, 0.0), Point3::new(0.0, 0.01, 0.0)],
///     vec![[0, 1, 2]],
/// );
///
/// let optimizer = MeshOptimizer::default();
/// let out = optimizer.optimize(&small, QualityTier::Low).unwrap();
/// assert!(!out.decimated);
/// assert_eq!(out.fragment, small);
/// assert!(out.optimization_time.is_zero());
/// ```
pub struct MeshOptimizer {
    config: OptimizerConfig,
    backend: Arc<dyn GeometryBackend>,
}

impl Default for MeshOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

impl std::fmt::Debug for MeshOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshOptimizer")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl MeshOptimizer {
    /// Creates an optimizer on the CPU backend.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            backend: Arc::new(CpuBackend::from_config(&config)),
        }
    }

    /// Creates an optimizer on a caller-supplied backend.
    #[must_use]
    pub fn with_backend(config: OptimizerConfig, backend: Arc<dyn GeometryBackend>) -> Self {
        Self { config, backend }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Backend both passes run on.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn GeometryBackend> {
        &self.backend
    }

    /// Optimizes one fragment.
    ///
    /// Fragments at or below the vertex ceiling come back unchanged with a
    /// zero optimization time, whether or not the backend is ready.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::PipelineUnavailable`] if the backend is not
    /// ready for either pass.
    pub fn optimize(&self, fragment: &MeshFragment, tier: QualityTier) -> OptimizeResult<OptimizedMesh> {
        let original_vertex_count = fragment.vertex_count();
        let original_face_count = fragment.face_count();
        if original_vertex_count <= self.config.vertex_ceiling {
            return Ok(OptimizedMesh {
                fragment: fragment.clone(),
                tier,
                original_vertex_count,
                original_face_count,
                optimization_time: Duration::ZERO,
                decimated: false,
            });
        }
        if !self.backend.is_ready() {
            return Err(OptimizeError::PipelineUnavailable {
                backend: self.backend.name(),
            });
        }

        let start = Instant::now();
        let target = tier.target_faces(original_face_count);
        let decimated = self.backend.decimate(fragment, target)?;
        let smoothed = self.backend.smooth(&decimated, tier.smoothing_iterations())?;
        let optimization_time = start.elapsed();

        debug!(
            fragment = %fragment.id,
            %tier,
            vertices_before = original_vertex_count,
            vertices_after = smoothed.vertex_count(),
            faces_before = original_face_count,
            faces_after = smoothed.face_count(),
            elapsed_ms = optimization_time.as_secs_f64() * 1e3,
            "fragment optimized"
        );
        Ok(OptimizedMesh {
            fragment: smoothed,
            tier,
            original_vertex_count,
            original_face_count,
            optimization_time,
            decimated: true,
        })
    }

    /// Optimizes fragments in parallel.
    ///
    /// Every fragment gets its own result tagged with its id. A failure on one
    /// does not cancel the others. Result order is not meaningful.
    pub fn batch_optimize(
        &self,
        fragments: &[MeshFragment],
        tier: QualityTier,
    ) -> Vec<(FragmentId, OptimizeResult<OptimizedMesh>)> {
        let results: Vec<_> = fragments
            .par_iter()
            .map(|f| (f.id, self.optimize(f, tier)))
            .collect();
        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed > 0 {
            warn!(failed, total = fragments.len(), %tier, "batch optimization had failures");
        }
        results
    }
}
