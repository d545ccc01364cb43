//! Geometry-processing backends.

use std::sync::atomic::{AtomicBool, Ordering};

use scan_types::MeshFragment;

use crate::{decimate, laplacian_smooth, OptimizeError, OptimizeResult, OptimizerConfig};

/// Executes the decimation and smoothing passes.
///
/// Both passes of one optimization run on the same backend. A backend that is
/// not ready must fail with [`OptimizeError::PipelineUnavailable`].
pub trait GeometryBackend: Send + Sync {
    /// Short name for logs and errors.
    fn name(&self) -> &'static str;

    /// Whether the processing pipelines are initialized.
    fn is_ready(&self) -> bool;

    /// Simplifies `fragment` toward `target_faces` faces.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::PipelineUnavailable`] if the backend is not ready.
    fn decimate(&self, fragment: &MeshFragment, target_faces: usize) -> OptimizeResult<MeshFragment>;

    /// Smooths `fragment` with `iterations` passes.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::PipelineUnavailable`] if the backend is not ready.
    fn smooth(&self, fragment: &MeshFragment, iterations: u32) -> OptimizeResult<MeshFragment>;
}

/// Backend running quadric decimation and Laplacian smoothing on the CPU.
#[derive(Debug)]
pub struct CpuBackend {
    lambda: f64,
    preserve_boundary: bool,
    ready: AtomicBool,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

impl CpuBackend {
    /// Creates a ready backend from optimizer settings.
    #[must_use]
    pub const fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            lambda: config.smoothing_lambda,
            preserve_boundary: config.preserve_boundary,
            ready: AtomicBool::new(true),
        }
    }

    /// Marks the backend ready or torn down.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    fn ensure_ready(&self) -> OptimizeResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(OptimizeError::PipelineUnavailable { backend: self.name() })
        }
    }
}

impl GeometryBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn decimate(&self, fragment: &MeshFragment, target_faces: usize) -> OptimizeResult<MeshFragment> {
        self.ensure_ready()?;
        Ok(decimate(fragment, target_faces, self.preserve_boundary).fragment)
    }

    fn smooth(&self, fragment: &MeshFragment, iterations: u32) -> OptimizeResult<MeshFragment> {
        self.ensure_ready()?;
        Ok(laplacian_smooth(fragment, iterations, self.lambda, self.preserve_boundary))
    }
}
