//! Verifier configuration.

use serde::{Deserialize, Serialize};

/// Accuracy verifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyConfig {
    /// Measurements kept per verification context.
    pub history_capacity: usize,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
        }
    }
}
