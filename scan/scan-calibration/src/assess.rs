//! Per-axis validation and recommendations.

use scan_types::{EnvironmentConditions, Severity, TrackingState};
use serde::{Deserialize, Serialize};

use crate::EnvironmentThresholds;

/// What the operator should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Change the light level or color.
    AdjustLighting,
    /// Move the device more slowly.
    ReduceMotion,
    /// Treat or change the scanned surface.
    ChangeSurface,
    /// Move closer, farther, or away from nearby surfaces.
    Reposition,
    /// Restart tracking.
    Recalibrate,
}

/// An actionable recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Action category.
    pub kind: RecommendationKind,
    /// Urgency.
    pub priority: Severity,
    /// Operator-facing text.
    pub message: String,
}

impl Recommendation {
    fn new(kind: RecommendationKind, priority: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            priority,
            message: message.into(),
        }
    }
}

/// Outcome of validating one condition sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentAssessment {
    /// The sample that was assessed.
    pub conditions: EnvironmentConditions,
    /// Recommendations, highest priority first.
    pub recommendations: Vec<Recommendation>,
    /// True when no recommendation is high priority or worse.
    pub suitable: bool,
}

impl EnvironmentAssessment {
    /// Whether a recommendation of `kind` was made.
    #[must_use]
    pub fn recommends(&self, kind: RecommendationKind) -> bool {
        self.recommendations.iter().any(|r| r.kind == kind)
    }
}

/// Validates each axis against `thresholds`.
#[must_use]
pub fn assess(conditions: &EnvironmentConditions, thresholds: &EnvironmentThresholds) -> EnvironmentAssessment {
    let mut recommendations = Vec::new();
    recommendations.extend(check_lighting(conditions, thresholds));
    recommendations.extend(check_motion(conditions, thresholds));
    recommendations.extend(check_tracking(conditions));
    recommendations.extend(check_surface(conditions, thresholds));
    recommendations.extend(check_space(conditions, thresholds));
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));

    let suitable = recommendations.iter().all(|r| !r.priority.is_blocking());
    EnvironmentAssessment {
        conditions: *conditions,
        recommendations,
        suitable,
    }
}

fn check_lighting(c: &EnvironmentConditions, t: &EnvironmentThresholds) -> Option<Recommendation> {
    let lux = c.lighting.ambient_intensity;
    let kelvin = c.lighting.color_temperature;
    if lux < t.min_light {
        let priority = if lux < 0.5 * t.min_light {
            Severity::High
        } else {
            Severity::Medium
        };
        Some(Recommendation::new(
            RecommendationKind::AdjustLighting,
            priority,
            format!("increase lighting to at least {:.0} lux (now {lux:.0})", t.min_light),
        ))
    } else if lux > t.max_light {
        Some(Recommendation::new(
            RecommendationKind::AdjustLighting,
            Severity::Medium,
            format!("reduce lighting below {:.0} lux (now {lux:.0})", t.max_light),
        ))
    } else if kelvin < t.min_color_temperature || kelvin > t.max_color_temperature {
        Some(Recommendation::new(
            RecommendationKind::AdjustLighting,
            Severity::Low,
            format!(
                "use neutral light between {:.0} K and {:.0} K",
                t.min_color_temperature, t.max_color_temperature
            ),
        ))
    } else {
        None
    }
}

fn check_motion(c: &EnvironmentConditions, t: &EnvironmentThresholds) -> Option<Recommendation> {
    let m = &c.motion;
    let excess = (m.linear_speed / t.max_linear_speed)
        .max(m.angular_speed / t.max_angular_speed)
        .max(m.blur / t.max_blur);
    if excess <= 1.0 {
        return None;
    }
    let priority = if excess > 2.0 {
        Severity::High
    } else {
        Severity::Medium
    };
    Some(Recommendation::new(
        RecommendationKind::ReduceMotion,
        priority,
        format!("slow down: moving at {:.1}x the allowed speed", excess),
    ))
}

fn check_tracking(c: &EnvironmentConditions) -> Option<Recommendation> {
    match c.motion.tracking {
        TrackingState::Normal => None,
        TrackingState::Limited(reason) => Some(Recommendation::new(
            RecommendationKind::Recalibrate,
            Severity::High,
            format!("tracking limited ({reason:?}); hold still over a textured area"),
        )),
        TrackingState::NotAvailable => Some(Recommendation::new(
            RecommendationKind::Recalibrate,
            Severity::Critical,
            "tracking lost; restart the session",
        )),
    }
}

fn check_surface(c: &EnvironmentConditions, t: &EnvironmentThresholds) -> Option<Recommendation> {
    let s = &c.surface;
    if s.reflectivity > t.max_reflectivity {
        Some(Recommendation::new(
            RecommendationKind::ChangeSurface,
            Severity::Medium,
            "surface is too reflective; apply matte spray or reduce direct light",
        ))
    } else if s.texture < t.min_texture {
        Some(Recommendation::new(
            RecommendationKind::ChangeSurface,
            Severity::Medium,
            "surface lacks texture; add markers or scan a more detailed area",
        ))
    } else if s.roughness > t.max_roughness {
        Some(Recommendation::new(
            RecommendationKind::ChangeSurface,
            Severity::Low,
            "surface is very rough; expect reduced accuracy",
        ))
    } else {
        None
    }
}

fn check_space(c: &EnvironmentConditions, t: &EnvironmentThresholds) -> Option<Recommendation> {
    if let Some(clearance) = c.space.clearance {
        if clearance < t.min_clearance {
            let priority = if clearance < 0.5 * t.min_clearance {
                Severity::High
            } else {
                Severity::Medium
            };
            return Some(Recommendation::new(
                RecommendationKind::Reposition,
                priority,
                format!("move away from nearby surfaces ({clearance:.2} m clearance)"),
            ));
        }
    }
    match c.space.subject_distance {
        Some(d) if d < t.min_distance => Some(Recommendation::new(
            RecommendationKind::Reposition,
            Severity::Medium,
            format!("move back to at least {:.2} m", t.min_distance),
        )),
        Some(d) if d > t.max_distance => Some(Recommendation::new(
            RecommendationKind::Reposition,
            Severity::Medium,
            format!("move closer, within {:.2} m", t.max_distance),
        )),
        _ => None,
    }
}
