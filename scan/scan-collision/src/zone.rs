//! Static safety zones.

use scan_types::{Aabb, Point3};
use serde::{Deserialize, Serialize};

/// How a zone constrains the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneKind {
    /// The device must stay inside.
    Required,
    /// The device must stay outside.
    Restricted,
}

/// An axis-aligned safety volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyZone {
    /// Label for logs and guidance.
    pub name: String,
    /// Constraint type.
    pub kind: ZoneKind,
    /// Extent.
    pub bounds: Aabb,
}

impl SafetyZone {
    /// A zone the device must stay inside.
    #[must_use]
    pub fn required(name: impl Into<String>, bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            kind: ZoneKind::Required,
            bounds,
        }
    }

    /// A zone the device must stay out of.
    #[must_use]
    pub fn restricted(name: impl Into<String>, bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            kind: ZoneKind::Restricted,
            bounds,
        }
    }

    /// Whether `p` violates this zone.
    #[must_use]
    pub fn is_violated_by(&self, p: &Point3<f64>) -> bool {
        match self.kind {
            ZoneKind::Required => !self.bounds.contains(p),
            ZoneKind::Restricted => self.bounds.contains(p),
        }
    }

    /// Checks `p` against the zone.
    ///
    /// The violation distance is how far outside a required zone, or how deep
    /// inside a restricted one, the position is.
    #[must_use]
    pub fn check(&self, p: &Point3<f64>) -> Option<ZoneViolation> {
        if !self.is_violated_by(p) {
            return None;
        }
        let distance = match self.kind {
            ZoneKind::Required => self.bounds.distance_to(p),
            ZoneKind::Restricted => self.bounds.depth_inside(p),
        };
        Some(ZoneViolation {
            zone: self.name.clone(),
            kind: self.kind,
            distance,
        })
    }
}

/// A safety-zone violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneViolation {
    /// Zone name.
    pub zone: String,
    /// Zone kind.
    pub kind: ZoneKind,
    /// Distance to the zone boundary.
    pub distance: f64,
}
