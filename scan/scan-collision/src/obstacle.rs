//! Obstacles and the per-session obstacle map.

use scan_types::{Aabb, PlaneAnchor, Point3, Timestamp};
use serde::{Deserialize, Serialize};

use crate::voxel::PointCluster;
use crate::CollisionSettings;

/// Obstacle category. Each has a fixed collision threshold distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    /// A detected plane (floor, wall, table).
    Plane,
    /// A cluster of feature points.
    PointCloud,
    /// A restricted safety zone.
    SafetyZone,
    /// A point-cloud obstacle that moved between frames.
    Dynamic,
}

impl ObstacleKind {
    /// Collision threshold distance in meters.
    ///
    /// ```
    /// use scan_collision::ObstacleKind;
    ///
    /// assert_eq!(ObstacleKind::Plane.threshold(), 0.3);
    /// assert_eq!(ObstacleKind::Dynamic.threshold(), 0.4);
    /// ```
    #[must_use]
    pub const fn threshold(self) -> f64 {
        match self {
            Self::Plane => 0.3,
            Self::PointCloud => 0.2,
            Self::SafetyZone => 0.5,
            Self::Dynamic => 0.4,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plane => "plane",
            Self::PointCloud => "point_cloud",
            Self::SafetyZone => "safety_zone",
            Self::Dynamic => "dynamic",
        }
    }
}

/// Identifier of an obstacle within one session's map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(pub u64);

/// Where an obstacle came from; used to match re-observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleSource {
    /// A plane anchor with this sensor id.
    Anchor(u64),
    /// Feature-point clustering.
    Cluster,
    /// A restricted zone, never pruned.
    Zone,
}

/// A tracked obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Map-local id.
    pub id: ObstacleId,
    /// Category.
    pub kind: ObstacleKind,
    /// Origin.
    pub source: ObstacleSource,
    /// World-space extent.
    pub bounds: Aabb,
    /// Last time it was observed.
    pub last_seen: Timestamp,
}

impl Obstacle {
    /// Distance from `p` to the obstacle's bounds (zero inside).
    #[must_use]
    pub fn distance_to(&self, p: &Point3<f64>) -> f64 {
        self.bounds.distance_to(p)
    }
}

/// All obstacles known to one collision session.
#[derive(Debug, Clone, Default)]
pub struct ObstacleMap {
    obstacles: Vec<Obstacle>,
    next_id: u64,
}

impl ObstacleMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current obstacles.
    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Number of obstacles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    /// True when the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    fn insert(&mut self, kind: ObstacleKind, source: ObstacleSource, bounds: Aabb, now: Timestamp) {
        self.next_id += 1;
        self.obstacles.push(Obstacle {
            id: ObstacleId(self.next_id),
            kind,
            source,
            bounds,
            last_seen: now,
        });
    }

    /// Adds a restricted zone as a permanent safety-zone obstacle.
    pub fn add_zone(&mut self, bounds: Aabb, now: Timestamp) {
        self.insert(ObstacleKind::SafetyZone, ObstacleSource::Zone, bounds, now);
    }

    /// Inserts or refreshes a plane obstacle keyed by its anchor id.
    pub fn merge_plane(&mut self, plane: &PlaneAnchor, now: Timestamp) {
        let bounds = plane.bounds();
        if let Some(existing) = self
            .obstacles
            .iter_mut()
            .find(|o| o.source == ObstacleSource::Anchor(plane.id))
        {
            existing.bounds = bounds;
            existing.last_seen = now;
        } else {
            self.insert(ObstacleKind::Plane, ObstacleSource::Anchor(plane.id), bounds, now);
        }
    }

    /// Inserts or refreshes a point-cloud obstacle.
    ///
    /// A cluster whose center lies within `match_distance` of a known cluster
    /// obstacle updates that obstacle; if the center moved more than
    /// `dynamic_motion_threshold` the obstacle becomes dynamic.
    pub fn merge_cluster(&mut self, cluster: &PointCluster, now: Timestamp, settings: &CollisionSettings) {
        let center = cluster.bounds.center();
        let nearest = self
            .obstacles
            .iter_mut()
            .filter(|o| o.source == ObstacleSource::Cluster)
            .map(|o| {
                let d = (o.bounds.center() - center).norm();
                (o, d)
            })
            .filter(|(_, d)| *d <= settings.match_distance)
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match nearest {
            Some((existing, moved)) => {
                if moved > settings.dynamic_motion_threshold {
                    existing.kind = ObstacleKind::Dynamic;
                }
                existing.bounds = cluster.bounds;
                existing.last_seen = now;
            }
            None => self.insert(
                ObstacleKind::PointCloud,
                ObstacleSource::Cluster,
                cluster.bounds,
                now,
            ),
        }
    }

    /// Drops observed obstacles not seen for more than `ttl_secs`. Returns the count removed.
    pub fn prune(&mut self, now: Timestamp, ttl_secs: f64) -> usize {
        let before = self.obstacles.len();
        self.obstacles.retain(|o| {
            o.source == ObstacleSource::Zone || now.seconds_since(o.last_seen) <= ttl_secs
        });
        before - self.obstacles.len()
    }
}
