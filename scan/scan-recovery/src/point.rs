//! Recovery points.

use std::time::SystemTime;

use scan_types::{Matrix4, MeshFragment, ScanId, Timestamp};
use serde::{Deserialize, Serialize};

/// Checkpoint of accumulated scan state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPoint {
    /// Scan the point belongs to.
    pub scan: ScanId,
    /// Caller-chosen name, unique per scan by convention.
    pub name: String,
    /// Capture time of the state.
    pub timestamp: Timestamp,
    /// Wall-clock creation time.
    pub created_at: SystemTime,
    /// Camera pose at the checkpoint.
    pub camera_pose: Matrix4<f64>,
    /// Fragments accepted so far.
    pub fragments: Vec<MeshFragment>,
}

impl RecoveryPoint {
    /// Creates a point stamped with the current wall time.
    #[must_use]
    pub fn new(
        scan: ScanId,
        name: impl Into<String>,
        timestamp: Timestamp,
        camera_pose: Matrix4<f64>,
        fragments: Vec<MeshFragment>,
    ) -> Self {
        Self {
            scan,
            name: name.into(),
            timestamp,
            created_at: SystemTime::now(),
            camera_pose,
            fragments,
        }
    }

    /// Total vertices across the stored fragments.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.fragments.iter().map(MeshFragment::vertex_count).sum()
    }

    pub(crate) fn storage_key(scan: ScanId, name: &str) -> String {
        format!("recovery/{scan}/{name}")
    }
}
