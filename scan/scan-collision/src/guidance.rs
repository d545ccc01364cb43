//! Collision tests and movement guidance.

use scan_types::{Point3, Severity, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Obstacle, ObstacleId, ObstacleKind, SafetyZone, ZoneKind, ZoneViolation};

/// Severity for a device at `distance` from an obstacle with `threshold`.
///
/// `d/threshold` below 0.25 is critical, below 0.5 high, below 0.75 medium,
/// otherwise low.
///
/// ```
/// use scan_collision::collision_severity;
/// use scan_types::Severity;
///
/// assert_eq!(collision_severity(0.0, 0.2), Severity::Critical);
/// assert_eq!(collision_severity(0.19, 0.2), Severity::Low);
/// ```
#[must_use]
pub fn collision_severity(distance: f64, threshold: f64) -> Severity {
    let ratio = if threshold > 0.0 { distance / threshold } else { 0.0 };
    if ratio < 0.25 {
        Severity::Critical
    } else if ratio < 0.5 {
        Severity::High
    } else if ratio < 0.75 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// A device position closer to an obstacle than its kind's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    /// Obstacle hit.
    pub obstacle: ObstacleId,
    /// Obstacle kind.
    pub kind: ObstacleKind,
    /// Device position.
    pub position: Point3<f64>,
    /// Closest point on the obstacle.
    pub closest_point: Point3<f64>,
    /// Obstacle center.
    pub obstacle_center: Point3<f64>,
    /// Measured distance.
    pub distance: f64,
    /// Threshold for the kind.
    pub threshold: f64,
    /// Severity from `distance / threshold`.
    pub severity: Severity,
}

/// Tests `position` against a single obstacle.
#[must_use]
pub fn test_obstacle(position: &Point3<f64>, obstacle: &Obstacle) -> Option<Collision> {
    let threshold = obstacle.kind.threshold();
    let distance = obstacle.distance_to(position);
    (distance < threshold).then(|| Collision {
        obstacle: obstacle.id,
        kind: obstacle.kind,
        position: *position,
        closest_point: obstacle.bounds.closest_point(position),
        obstacle_center: obstacle.bounds.center(),
        distance,
        threshold,
        severity: collision_severity(distance, threshold),
    })
}

/// Collisions and zone violations at `position`.
#[must_use]
pub fn check_position(
    position: &Point3<f64>,
    obstacles: &[Obstacle],
    zones: &[SafetyZone],
) -> (Vec<Collision>, Vec<ZoneViolation>) {
    let collisions = obstacles
        .iter()
        .filter_map(|o| test_obstacle(position, o))
        .collect();
    let violations = zones.iter().filter_map(|z| z.check(position)).collect();
    (collisions, violations)
}

/// Where the device should move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovementGuidance {
    /// Unit direction in world space.
    pub direction: Vector3<f64>,
    /// Urgency, the severity of the collision being avoided.
    pub urgency: Severity,
    /// Obstacle being avoided.
    pub avoiding: ObstacleId,
    /// How much farther the device must move to clear the threshold.
    pub clearance_needed: f64,
}

const EPS: f64 = 1e-9;

/// Guidance away from the highest-severity collision.
///
/// Ties are broken by the smaller distance. Direction components that would
/// carry the device out of a required zone, or into a restricted one, within
/// `step` are removed. If nothing remains the device is sent toward the
/// center of the first required zone, or straight away from the obstacle
/// when there is no such zone or it is already there. Returns `None` only
/// without collisions.
#[must_use]
pub fn movement_guidance(
    position: &Point3<f64>,
    collisions: &[Collision],
    zones: &[SafetyZone],
    step: f64,
) -> Option<MovementGuidance> {
    let worst = collisions.iter().max_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| b.distance.total_cmp(&a.distance))
    })?;

    let mut direction = position - worst.closest_point;
    if direction.norm() < EPS {
        direction = position - worst.obstacle_center;
    }
    if direction.norm() < EPS {
        direction = Vector3::z();
    }
    let escape = direction.normalize();
    direction = escape;

    for axis in 0..3 {
        let mut next = *position;
        next[axis] += direction[axis] * step;
        let leaves_zone = zones
            .iter()
            .any(|z| z.is_violated_by(&next) && !z.is_violated_by(position));
        if leaves_zone {
            direction[axis] = 0.0;
        }
    }

    if direction.norm() < EPS {
        direction = zones
            .iter()
            .find(|z| z.kind == ZoneKind::Required)
            .map(|home| home.bounds.center() - position)
            .filter(|toward| toward.norm() >= EPS)
            .unwrap_or(escape);
    }

    Some(MovementGuidance {
        direction: direction.normalize(),
        urgency: worst.severity,
        avoiding: worst.obstacle,
        clearance_needed: (worst.threshold - worst.distance).max(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObstacleSource;
    use approx::assert_relative_eq;
    use scan_types::{Aabb, Timestamp};

    fn obstacle(id: u64, kind: ObstacleKind, center: Point3<f64>) -> Obstacle {
        Obstacle {
            id: ObstacleId(id),
            kind,
            source: ObstacleSource::Cluster,
            bounds: Aabb::from_center(center, Vector3::repeat(0.05)),
            last_seen: Timestamp::default(),
        }
    }

    #[test]
    fn severity_bands() {
        assert_eq!(collision_severity(0.04, 0.2), Severity::Critical);
        assert_eq!(collision_severity(0.06, 0.2), Severity::High);
        assert_eq!(collision_severity(0.12, 0.2), Severity::Medium);
        assert_eq!(collision_severity(0.16, 0.2), Severity::Low);
    }

    #[test]
    fn collision_below_threshold_only() {
        let o = obstacle(1, ObstacleKind::PointCloud, Point3::origin());
        assert!(test_obstacle(&Point3::new(0.2, 0.0, 0.0), &o).is_some());
        assert!(test_obstacle(&Point3::new(0.3, 0.0, 0.0), &o).is_none());
    }

    #[test]
    fn guidance_points_away_from_worst() {
        let near = obstacle(1, ObstacleKind::PointCloud, Point3::new(0.1, 0.0, 0.0));
        let far = obstacle(2, ObstacleKind::Plane, Point3::new(0.0, 0.3, 0.0));
        let position = Point3::origin();
        let (collisions, _) = check_position(&position, &[near, far], &[]);
        assert_eq!(collisions.len(), 2);

        let g = movement_guidance(&position, &collisions, &[], 0.1).unwrap();
        assert_eq!(g.avoiding, ObstacleId(1));
        assert_relative_eq!(g.direction, -Vector3::x(), epsilon = 1e-12);
        assert_relative_eq!(g.direction.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn guidance_stays_inside_required_zone() {
        // Device near the workspace's -x wall, obstacle on its +x side.
        let workspace = SafetyZone::required(
            "workspace",
            Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)),
        );
        let position = Point3::new(-0.95, 0.0, 0.0);
        let o = obstacle(1, ObstacleKind::PointCloud, Point3::new(-0.8, 0.1, 0.0));
        let (collisions, _) = check_position(&position, &[o], std::slice::from_ref(&workspace));
        let g = movement_guidance(&position, &collisions, &[workspace], 0.1).unwrap();
        assert_relative_eq!(g.direction.x, 0.0);
        assert!(g.direction.y < 0.0);
    }

    #[test]
    fn boxed_in_device_still_gets_guidance() {
        // Obstacle on +x, restricted zone right behind the device on -x.
        let o = obstacle(1, ObstacleKind::PointCloud, Point3::new(0.1, 0.0, 0.0));
        let position = Point3::origin();
        let (collisions, _) = check_position(&position, &[o], &[]);
        let behind = SafetyZone::restricted(
            "behind",
            Aabb::new(Point3::new(-0.2, -0.05, -0.05), Point3::new(-0.05, 0.05, 0.05)),
        );

        // No required zone to head for.
        let g = movement_guidance(&position, &collisions, std::slice::from_ref(&behind), 0.1).unwrap();
        assert_relative_eq!(g.direction, -Vector3::x(), epsilon = 1e-12);
        assert_eq!(g.avoiding, ObstacleId(1));

        // Already at the required zone's center.
        let workspace = SafetyZone::required(
            "workspace",
            Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)),
        );
        let g = movement_guidance(&position, &collisions, &[behind, workspace], 0.1).unwrap();
        assert_relative_eq!(g.direction, -Vector3::x(), epsilon = 1e-12);
    }

    #[test]
    fn no_collisions_no_guidance() {
        assert!(movement_guidance(&Point3::origin(), &[], &[], 0.1).is_none());
    }
}
