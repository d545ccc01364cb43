//! Property tests for collision thresholds and guidance.

use proptest::prelude::*;
use scan_collision::{
    check_position, movement_guidance, test_obstacle, Obstacle, ObstacleId, ObstacleKind,
    ObstacleSource, SafetyZone,
};
use scan_types::{Aabb, Point3, Timestamp, Vector3};

fn kind_strategy() -> impl Strategy<Value = ObstacleKind> {
    prop_oneof![
        Just(ObstacleKind::Plane),
        Just(ObstacleKind::PointCloud),
        Just(ObstacleKind::SafetyZone),
        Just(ObstacleKind::Dynamic),
    ]
}

fn obstacle(kind: ObstacleKind, center: Point3<f64>, half: f64) -> Obstacle {
    Obstacle {
        id: ObstacleId(1),
        kind,
        source: ObstacleSource::Cluster,
        bounds: Aabb::from_center(center, Vector3::repeat(half)),
        last_seen: Timestamp::default(),
    }
}

proptest! {
    /// Distance below the kind's threshold always collides; above never does.
    #[test]
    fn threshold_monotonicity(
        kind in kind_strategy(),
        cx in -1.0f64..1.0,
        cy in -1.0f64..1.0,
        cz in -1.0f64..1.0,
        half in 0.0f64..0.2,
        theta in 0.0f64..std::f64::consts::TAU,
        fraction in 0.0f64..3.0,
    ) {
        let center = Point3::new(cx, cy, cz);
        let o = obstacle(kind, center, half);
        let threshold = kind.threshold();
        // Approach along a face normal so the box distance is exact.
        let dir = Vector3::new(theta.cos(), theta.sin(), 0.0);
        let axis = if dir.x.abs() >= dir.y.abs() {
            Vector3::x() * dir.x.signum()
        } else {
            Vector3::y() * dir.y.signum()
        };
        let gap = fraction * threshold;
        let position = center + axis * (half + gap);

        let hit = test_obstacle(&position, &o);
        if gap < threshold * (1.0 - 1e-9) {
            prop_assert!(hit.is_some());
        } else if gap > threshold * (1.0 + 1e-9) {
            prop_assert!(hit.is_none());
        }
    }

    /// Guidance is a unit vector whenever there is a collision.
    #[test]
    fn guidance_is_unit(
        ox in -0.3f64..0.3,
        oy in -0.3f64..0.3,
        oz in -0.3f64..0.3,
    ) {
        let o = obstacle(ObstacleKind::PointCloud, Point3::new(ox, oy, oz), 0.05);
        let zones = vec![SafetyZone::required(
            "workspace",
            Aabb::from_center(Point3::origin(), Vector3::repeat(1.5)),
        )];
        let position = Point3::origin();
        let (collisions, _) = check_position(&position, &[o], &zones);
        if let Some(g) = movement_guidance(&position, &collisions, &zones, 0.1) {
            prop_assert!((g.direction.norm() - 1.0).abs() < 1e-9);
        } else {
            prop_assert!(collisions.is_empty());
        }
    }
}
