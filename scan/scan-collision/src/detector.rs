//! The collision detector service.

use std::time::SystemTime;

use parking_lot::Mutex;
use scan_history::ContextRegistry;
use scan_types::{
    CollaboratorResult, ContextId, EnvironmentSnapshot, Point3, RequirementLevel, ScanFrame,
    ScanId, ScanSessionHook, Timestamp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::voxel::{PointCluster, VoxelMap};
use crate::{
    check_position, movement_guidance, Collision, CollisionError, CollisionResult,
    CollisionSettings, MovementGuidance, Obstacle, ObstacleMap, SafetyZone, ZoneViolation,
};

/// Result of one [`CollisionDetector::update_scan`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionUpdate {
    /// Frame timestamp.
    pub timestamp: Timestamp,
    /// Device position tested.
    pub position: Point3<f64>,
    /// Obstacles in the map after merging the frame.
    pub obstacles: Vec<Obstacle>,
    /// Obstacles closer than their threshold.
    pub collisions: Vec<Collision>,
    /// Safety zones violated.
    pub violations: Vec<ZoneViolation>,
    /// Where to move, present when there is at least one collision.
    pub guidance: Option<MovementGuidance>,
}

impl CollisionUpdate {
    /// True when the device is clear of obstacles and zones.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.collisions.is_empty() && self.violations.is_empty()
    }
}

#[derive(Debug)]
struct CollisionContext {
    scan: ScanId,
    started: SystemTime,
    level: RequirementLevel,
    map: ObstacleMap,
    zones: Vec<SafetyZone>,
    updates: u64,
}

/// Tracks obstacles and safety zones for any number of scans.
///
/// # Example
///
/// ```
/// use scan_collision::CollisionDetector;
/// use scan_types::{CameraState, EnvironmentSnapshot, Point3, ScanFrame, ScanId, Timestamp};
///
/// let detector = CollisionDetector::default();
/// let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
///
/// let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::at(Point3::origin()));
/// let update = detector.update_scan(ctx, &frame).unwrap();
/// assert!(update.is_clear());
///
/// detector.end_collision_detection(ctx);
/// assert!(detector.update_scan(ctx, &frame).is_err());
/// ```
#[derive(Debug, Default)]
pub struct CollisionDetector {
    settings: CollisionSettings,
    contexts: Mutex<ContextRegistry<CollisionContext>>,
}

impl CollisionDetector {
    /// Creates a detector.
    #[must_use]
    pub fn new(settings: CollisionSettings) -> Self {
        Self {
            settings,
            contexts: Mutex::new(ContextRegistry::new()),
        }
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &CollisionSettings {
        &self.settings
    }

    /// Number of active contexts.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Starts detection for a scan with the standard requirement level.
    pub fn start_collision_detection(&self, scan: ScanId, snapshot: &EnvironmentSnapshot) -> ContextId {
        self.start_with_level(scan, RequirementLevel::Standard, snapshot)
    }

    /// Starts detection, seeding zones and plane obstacles from `snapshot`.
    ///
    /// The workspace becomes a required zone. The subject bounds, grown by
    /// `subject_clearance`, become a restricted zone and a safety-zone obstacle.
    pub fn start_with_level(
        &self,
        scan: ScanId,
        level: RequirementLevel,
        snapshot: &EnvironmentSnapshot,
    ) -> ContextId {
        let now = snapshot.conditions.timestamp;
        let mut zones = vec![SafetyZone::required("workspace", snapshot.workspace)];
        let mut map = ObstacleMap::new();
        if let Some(subject) = snapshot.subject {
            let restricted = subject.expanded(self.settings.subject_clearance);
            zones.push(SafetyZone::restricted("subject", restricted));
            map.add_zone(restricted, now);
        }
        for plane in &snapshot.planes {
            map.merge_plane(plane, now);
        }

        let zone_count = zones.len();
        let obstacle_count = map.len();
        let id = self.contexts.lock().insert(CollisionContext {
            scan,
            started: SystemTime::now(),
            level,
            map,
            zones,
            updates: 0,
        });
        info!(%scan, context = %id, zones = zone_count, obstacles = obstacle_count, "collision detection started");
        id
    }

    /// Merges the frame's obstacles and tests the device position.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::ContextNotFound`] for an unknown or ended context.
    pub fn update_scan(&self, context: ContextId, frame: &ScanFrame) -> CollisionResult<CollisionUpdate> {
        let clusters = self.frame_clusters(frame);
        self.apply_clusters(context, frame, &clusters)
    }

    /// Clusters the frame's feature points. Touches no session state.
    #[must_use]
    pub fn frame_clusters(&self, frame: &ScanFrame) -> Vec<PointCluster> {
        VoxelMap::from_points(self.settings.resolution, frame.points())
            .clusters(self.settings.min_cluster_points)
    }

    /// Second half of [`update_scan`](Self::update_scan): merges clusters
    /// from [`frame_clusters`](Self::frame_clusters) and the frame's planes,
    /// then tests the device position.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::ContextNotFound`] for an unknown or ended context.
    pub fn apply_clusters(
        &self,
        context: ContextId,
        frame: &ScanFrame,
        clusters: &[PointCluster],
    ) -> CollisionResult<CollisionUpdate> {
        let mut contexts = self.contexts.lock();
        let ctx = contexts
            .get_mut(context)
            .ok_or(CollisionError::not_found(context))?;

        let now = frame.timestamp;
        for plane in &frame.planes {
            ctx.map.merge_plane(plane, now);
        }
        for cluster in clusters {
            ctx.map.merge_cluster(cluster, now, &self.settings);
        }
        let pruned = ctx.map.prune(now, self.settings.obstacle_ttl_secs);
        ctx.updates += 1;

        let position = frame.camera.position();
        let (collisions, violations) = check_position(&position, ctx.map.obstacles(), &ctx.zones);
        let guidance = movement_guidance(&position, &collisions, &ctx.zones, self.settings.guidance_step);

        if let Some(g) = &guidance {
            warn!(
                scan = %ctx.scan,
                collisions = collisions.len(),
                urgency = %g.urgency,
                "collision risk"
            );
        }
        debug!(
            context = %context,
            obstacles = ctx.map.len(),
            clusters = clusters.len(),
            pruned,
            violations = violations.len(),
            "collision update"
        );

        Ok(CollisionUpdate {
            timestamp: now,
            position,
            obstacles: ctx.map.obstacles().to_vec(),
            collisions,
            violations,
            guidance,
        })
    }

    /// Snapshot of the context's obstacles.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::ContextNotFound`] for an unknown or ended context.
    pub fn obstacles(&self, context: ContextId) -> CollisionResult<Vec<Obstacle>> {
        self.contexts
            .lock()
            .get(context)
            .map(|ctx| ctx.map.obstacles().to_vec())
            .ok_or(CollisionError::not_found(context))
    }

    /// Snapshot of the context's safety zones.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::ContextNotFound`] for an unknown or ended context.
    pub fn safety_zones(&self, context: ContextId) -> CollisionResult<Vec<SafetyZone>> {
        self.contexts
            .lock()
            .get(context)
            .map(|ctx| ctx.zones.clone())
            .ok_or(CollisionError::not_found(context))
    }

    /// Adds a safety zone to an active context.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionError::ContextNotFound`] for an unknown or ended context.
    pub fn add_safety_zone(&self, context: ContextId, zone: SafetyZone) -> CollisionResult<()> {
        let mut contexts = self.contexts.lock();
        let ctx = contexts
            .get_mut(context)
            .ok_or(CollisionError::not_found(context))?;
        ctx.zones.push(zone);
        Ok(())
    }

    /// Ends detection. Returns false if the context was already gone.
    pub fn end_collision_detection(&self, context: ContextId) -> bool {
        match self.contexts.lock().remove(context) {
            Some(ctx) => {
                let secs = ctx.started.elapsed().map_or(0.0, |d| d.as_secs_f64());
                info!(
                    scan = %ctx.scan,
                    context = %context,
                    level = %ctx.level,
                    updates = ctx.updates,
                    duration_secs = secs,
                    "collision detection ended"
                );
                true
            }
            None => false,
        }
    }
}

impl ScanSessionHook for CollisionDetector {
    fn name(&self) -> &'static str {
        "collision"
    }

    fn open(
        &self,
        scan: ScanId,
        level: RequirementLevel,
        snapshot: &EnvironmentSnapshot,
    ) -> CollaboratorResult<ContextId> {
        Ok(self.start_with_level(scan, level, snapshot))
    }

    fn close(&self, context: ContextId) {
        self.end_collision_detection(context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ObstacleKind, ZoneKind};
    use scan_types::{Aabb, CameraState, PlaneAnchor, Severity, Vector3};

    fn blob(center: Point3<f64>) -> Vec<Point3<f64>> {
        (0..8)
            .map(|i| center + Vector3::new(f64::from(i) * 0.003, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn subject_seeds_zone_and_obstacle() {
        let detector = CollisionDetector::default();
        let snapshot = EnvironmentSnapshot::default()
            .with_subject(Aabb::from_center(Point3::new(0.0, 0.0, -0.5), Vector3::repeat(0.1)));
        let ctx = detector.start_collision_detection(ScanId(1), &snapshot);

        let zones = detector.safety_zones(ctx).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[1].kind, ZoneKind::Restricted);

        let obstacles = detector.obstacles(ctx).unwrap();
        assert_eq!(obstacles.len(), 1);
        assert_eq!(obstacles[0].kind, ObstacleKind::SafetyZone);
    }

    #[test]
    fn nearby_cluster_triggers_guidance() {
        let detector = CollisionDetector::default();
        let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
        let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::at(Point3::origin()))
            .with_feature_points(blob(Point3::new(0.0, 0.0, -0.03)));

        let update = detector.update_scan(ctx, &frame).unwrap();
        assert_eq!(update.obstacles.len(), 1);
        assert_eq!(update.collisions.len(), 1);
        assert_eq!(update.collisions[0].severity, Severity::Critical);
        let g = update.guidance.unwrap();
        assert!(g.direction.z > 0.9);
    }

    #[test]
    fn clustering_leaves_map_untouched_until_applied() {
        let detector = CollisionDetector::default();
        let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
        let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default())
            .with_feature_points(blob(Point3::new(0.5, 0.5, 0.5)));

        let clusters = detector.frame_clusters(&frame);
        assert_eq!(clusters.len(), 1);
        assert!(detector.obstacles(ctx).unwrap().is_empty());

        let update = detector.apply_clusters(ctx, &frame, &clusters).unwrap();
        assert_eq!(update.obstacles.len(), 1);
        assert_eq!(detector.obstacles(ctx).unwrap().len(), 1);
    }

    #[test]
    fn stale_obstacles_are_pruned() {
        let detector = CollisionDetector::default();
        let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
        let seen = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default())
            .with_feature_points(blob(Point3::new(0.5, 0.5, 0.5)));
        detector.update_scan(ctx, &seen).unwrap();

        let later = ScanFrame::new(Timestamp::from_secs(1.5), CameraState::default());
        let update = detector.update_scan(ctx, &later).unwrap();
        assert!(update.obstacles.is_empty());
    }

    #[test]
    fn plane_anchor_collision() {
        let detector = CollisionDetector::default();
        let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
        let floor = PlaneAnchor {
            id: 1,
            center: Point3::new(0.0, -0.2, 0.0),
            half_extents: Vector3::new(1.0, 0.0, 1.0),
            normal: Vector3::y(),
        };
        let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::default()).with_plane(floor);
        let update = detector.update_scan(ctx, &frame).unwrap();
        assert_eq!(update.collisions.len(), 1);
        assert_eq!(update.collisions[0].kind, ObstacleKind::Plane);
        assert!(update.guidance.unwrap().direction.y > 0.9);
    }

    #[test]
    fn leaving_workspace_is_a_violation() {
        let detector = CollisionDetector::default();
        let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
        let frame = ScanFrame::new(Timestamp::from_secs(0.0), CameraState::at(Point3::new(2.0, 0.0, 0.0)));
        let update = detector.update_scan(ctx, &frame).unwrap();
        assert!(update.collisions.is_empty());
        assert_eq!(update.violations.len(), 1);
        assert_eq!(update.violations[0].zone, "workspace");
        assert!(!update.is_clear());
    }

    #[test]
    fn end_is_idempotent() {
        let detector = CollisionDetector::default();
        let ctx = detector.start_collision_detection(ScanId(1), &EnvironmentSnapshot::default());
        assert!(detector.end_collision_detection(ctx));
        assert!(!detector.end_collision_detection(ctx));
        assert_eq!(
            detector.obstacles(ctx),
            Err(CollisionError::not_found(ctx))
        );
    }

    #[test]
    fn works_as_session_hook() {
        let detector = CollisionDetector::default();
        let hook: &dyn ScanSessionHook = &detector;
        let ctx = hook
            .open(ScanId(4), RequirementLevel::Medical, &EnvironmentSnapshot::default())
            .unwrap();
        assert_eq!(detector.active_count(), 1);
        hook.close(ctx);
        hook.close(ctx);
        assert_eq!(detector.active_count(), 0);
    }
}
