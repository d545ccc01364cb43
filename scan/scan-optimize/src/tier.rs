//! Quality tiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How aggressively a fragment is simplified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Light touch: 20% of faces removed, one smoothing pass.
    #[default]
    High,
    /// 40% of faces removed, two smoothing passes.
    Medium,
    /// 60% of faces removed, three smoothing passes.
    Low,
}

impl QualityTier {
    /// All tiers, highest quality first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Share of faces decimation removes.
    #[must_use]
    pub const fn reduction(self) -> f64 {
        match self {
            Self::High => 0.2,
            Self::Medium => 0.4,
            Self::Low => 0.6,
        }
    }

    /// Laplacian smoothing iterations after decimation.
    #[must_use]
    pub const fn smoothing_iterations(self) -> u32 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    /// Face count decimation aims for.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn target_faces(self, faces: usize) -> usize {
        (faces as f64 * (1.0 - self.reduction())).ceil() as usize
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        })
    }
}
