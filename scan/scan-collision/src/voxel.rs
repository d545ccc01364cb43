//! Sparse voxel bucketing and connected-component clustering of feature points.

use hashbrown::{HashMap, HashSet};
use scan_types::{Aabb, Point3};

/// Integer voxel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoxelCoord {
    /// X index.
    pub x: i32,
    /// Y index.
    pub y: i32,
    /// Z index.
    pub z: i32,
}

impl VoxelCoord {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The 26 face, edge and corner neighbors.
    #[must_use]
    pub fn all_neighbors(self) -> [Self; 26] {
        let mut out = [self; 26];
        let mut i = 0;
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    out[i] = Self::new(self.x + dx, self.y + dy, self.z + dz);
                    i += 1;
                }
            }
        }
        out
    }
}

/// Points bucketed by voxel.
#[derive(Debug, Clone)]
pub struct VoxelMap {
    inv_voxel_size: f64,
    cells: HashMap<VoxelCoord, Vec<Point3<f64>>>,
}

impl VoxelMap {
    /// Buckets `points` into voxels of edge `voxel_size`.
    #[must_use]
    pub fn from_points(voxel_size: f64, points: &[Point3<f64>]) -> Self {
        let voxel_size = voxel_size.abs().max(f64::EPSILON);
        let mut map = Self {
            inv_voxel_size: 1.0 / voxel_size,
            cells: HashMap::new(),
        };
        for p in points.iter().filter(|p| p.coords.iter().all(|c| c.is_finite())) {
            let coord = map.world_to_grid(p);
            map.cells.entry(coord).or_default().push(*p);
        }
        map
    }

    /// Voxel containing a world point.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn world_to_grid(&self, p: &Point3<f64>) -> VoxelCoord {
        VoxelCoord::new(
            (p.x * self.inv_voxel_size).floor() as i32,
            (p.y * self.inv_voxel_size).floor() as i32,
            (p.z * self.inv_voxel_size).floor() as i32,
        )
    }

    /// Number of occupied voxels.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.cells.len()
    }

    /// Groups occupied voxels into 26-connected clusters.
    ///
    /// Clusters with fewer than `min_points` points are dropped. Output is
    /// ordered by each cluster's smallest voxel so results are deterministic.
    #[must_use]
    pub fn clusters(&self, min_points: usize) -> Vec<PointCluster> {
        let mut seeds: Vec<VoxelCoord> = self.cells.keys().copied().collect();
        seeds.sort_unstable();

        let mut visited: HashSet<VoxelCoord> = HashSet::with_capacity(self.cells.len());
        let mut out = Vec::new();
        for seed in seeds {
            if !visited.insert(seed) {
                continue;
            }
            let mut stack = vec![seed];
            let mut bounds: Option<Aabb> = None;
            let mut count = 0;
            while let Some(coord) = stack.pop() {
                let Some(points) = self.cells.get(&coord) else {
                    continue;
                };
                count += points.len();
                for p in points {
                    bounds = Some(bounds.map_or_else(
                        || Aabb::new(*p, *p),
                        |mut b| {
                            b.include(p);
                            b
                        },
                    ));
                }
                for n in coord.all_neighbors() {
                    if self.cells.contains_key(&n) && visited.insert(n) {
                        stack.push(n);
                    }
                }
            }
            if let Some(bounds) = bounds {
                if count >= min_points {
                    out.push(PointCluster { bounds, points: count });
                }
            }
        }
        out
    }
}

/// A connected group of feature points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCluster {
    /// Bounds of the member points.
    pub bounds: Aabb,
    /// Number of member points.
    pub points: usize,
}
