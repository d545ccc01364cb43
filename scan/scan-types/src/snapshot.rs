//! One-shot description of the capture environment at session start.

use serde::{Deserialize, Serialize};

use crate::{Aabb, EnvironmentConditions, PlaneAnchor, Point3, Vector3};

/// Environment snapshot handed to every analyzer when a scan begins.
///
/// The collision detector seeds its safety zones from `workspace` (the volume
/// the device must stay inside) and `subject` (the volume it must not enter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    /// Conditions at session start.
    pub conditions: EnvironmentConditions,
    /// Allowed device volume.
    pub workspace: Aabb,
    /// Bounds of the scanned subject, if known.
    pub subject: Option<Aabb>,
    /// Planes detected before the scan.
    pub planes: Vec<PlaneAnchor>,
}

impl Default for EnvironmentSnapshot {
    /// A 3 m cube around the origin, no subject.
    fn default() -> Self {
        Self {
            conditions: EnvironmentConditions::default(),
            workspace: Aabb::from_center(Point3::origin(), Vector3::repeat(1.5)),
            subject: None,
            planes: Vec::new(),
        }
    }
}

impl EnvironmentSnapshot {
    /// Sets the subject bounds.
    #[must_use]
    pub fn with_subject(mut self, subject: Aabb) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the workspace bounds.
    #[must_use]
    pub fn with_workspace(mut self, workspace: Aabb) -> Self {
        self.workspace = workspace;
        self
    }

    /// Sets the starting conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: EnvironmentConditions) -> Self {
        self.conditions = conditions;
        self
    }
}
