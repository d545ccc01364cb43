//! Recovery manager configuration.

use serde::{Deserialize, Serialize};

/// Settings for [`RecoveryManager`](crate::RecoveryManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Recovery points kept per scan.
    pub max_recovery_points: usize,
    /// Interruption records kept across all scans.
    pub history_capacity: usize,
    /// Back up each recovery point to secure storage when one is attached.
    pub backup_recovery_points: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_recovery_points: 5,
            history_capacity: 50,
            backup_recovery_points: true,
        }
    }
}
