//! Self-intersection detection.
//!
//! Candidate pairs come from a uniform grid over triangle bounds; each pair
//! is confirmed with an exact edge/triangle test in both directions.

// Barycentric determinant terms trip this lint.
#![allow(clippy::suspicious_operation_groupings)]

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

/// Triangles covering more cells than this skip the grid and are tested
/// against everything.
const MAX_CELLS_PER_TRIANGLE: i64 = 512;

/// A triangle to test, with its vertex indices for shared-vertex filtering.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexedTriangle {
    pub indices: [u32; 3],
    pub points: [Point3<f64>; 3],
}

impl IndexedTriangle {
    fn shares_vertex(&self, other: &Self) -> bool {
        self.indices.iter().any(|i| other.indices.contains(i))
    }

    fn bounds(&self) -> (Point3<f64>, Point3<f64>) {
        let [a, b, c] = self.points;
        (a.inf(&b).inf(&c), a.sup(&b).sup(&c))
    }
}

/// Counts pairs of triangles without a shared vertex that intersect.
pub(crate) fn count_intersecting_pairs(triangles: &[IndexedTriangle], epsilon: f64) -> usize {
    if triangles.len() < 2 {
        return 0;
    }

    let cell = mean_extent(triangles).max(1e-9);
    let key = |p: &Point3<f64>| -> [i64; 3] {
        [
            (p.x / cell).floor() as i64,
            (p.y / cell).floor() as i64,
            (p.z / cell).floor() as i64,
        ]
    };

    let mut grid: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
    let mut oversized = Vec::new();
    for (i, tri) in triangles.iter().enumerate() {
        let (lo, hi) = tri.bounds();
        let (lo, hi) = (key(&lo), key(&hi));
        let span = (hi[0] - lo[0] + 1) * (hi[1] - lo[1] + 1) * (hi[2] - lo[2] + 1);
        if span > MAX_CELLS_PER_TRIANGLE {
            oversized.push(i);
            continue;
        }
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    grid.entry([x, y, z]).or_default().push(i);
                }
            }
        }
    }

    let mut candidates: HashSet<(usize, usize)> = HashSet::new();
    for members in grid.values() {
        for (k, &a) in members.iter().enumerate() {
            for &b in &members[k + 1..] {
                candidates.insert((a.min(b), a.max(b)));
            }
        }
    }
    for &a in &oversized {
        for b in 0..triangles.len() {
            if a != b {
                candidates.insert((a.min(b), a.max(b)));
            }
        }
    }

    let candidates: Vec<(usize, usize)> = candidates.into_iter().collect();
    candidates
        .par_iter()
        .filter(|&&(a, b)| {
            let (ta, tb) = (&triangles[a], &triangles[b]);
            !ta.shares_vertex(tb) && triangles_intersect(&ta.points, &tb.points, epsilon)
        })
        .count()
}

fn mean_extent(triangles: &[IndexedTriangle]) -> f64 {
    let total: f64 = triangles
        .iter()
        .map(|t| {
            let (lo, hi) = t.bounds();
            (hi - lo).max()
        })
        .sum();
    total / triangles.len() as f64
}

/// Test if two triangles intersect via the six edge/triangle tests.
pub(crate) fn triangles_intersect(a: &[Point3<f64>; 3], b: &[Point3<f64>; 3], epsilon: f64) -> bool {
    let edges_a = [(a[0], a[1]), (a[1], a[2]), (a[2], a[0])];
    if edges_a
        .iter()
        .any(|(e0, e1)| edge_crosses_triangle(e0, e1, b, epsilon))
    {
        return true;
    }
    let edges_b = [(b[0], b[1]), (b[1], b[2]), (b[2], b[0])];
    edges_b
        .iter()
        .any(|(e0, e1)| edge_crosses_triangle(e0, e1, a, epsilon))
}

/// Möller-Trumbore restricted to the segment `e0..e1`.
fn edge_crosses_triangle(
    e0: &Point3<f64>,
    e1: &Point3<f64>,
    tri: &[Point3<f64>; 3],
    epsilon: f64,
) -> bool {
    let direction: Vector3<f64> = e1 - e0;
    if direction.norm_squared() < epsilon * epsilon {
        return false;
    }

    let edge1 = tri[1] - tri[0];
    let edge2 = tri[2] - tri[0];
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    // Edge is parallel to triangle
    if a.abs() < epsilon {
        return false;
    }

    let f = 1.0 / a;
    let s = e0 - tri[0];
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return false;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return false;
    }

    let t = f * edge2.dot(&q);
    (-epsilon..=1.0 + epsilon).contains(&t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(indices: [u32; 3], pts: [[f64; 3]; 3]) -> IndexedTriangle {
        IndexedTriangle {
            indices,
            points: pts.map(|p| Point3::new(p[0], p[1], p[2])),
        }
    }

    #[test]
    fn crossing_triangles() {
        let a = tri([0, 1, 2], [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let b = tri(
            [3, 4, 5],
            [[0.2, 0.2, -0.5], [0.2, 0.2, 0.5], [0.8, -0.5, 0.0]],
        );
        assert!(triangles_intersect(&a.points, &b.points, 1e-9));
        assert_eq!(count_intersecting_pairs(&[a, b], 1e-9), 1);
    }

    #[test]
    fn separated_triangles() {
        let a = tri([0, 1, 2], [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let b = tri([3, 4, 5], [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]);
        assert!(!triangles_intersect(&a.points, &b.points, 1e-9));
        assert_eq!(count_intersecting_pairs(&[a, b], 1e-9), 0);
    }

    #[test]
    fn shared_vertex_pairs_are_ignored() {
        let a = tri([0, 1, 2], [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let b = tri(
            [0, 4, 5],
            [[0.0, 0.0, 0.0], [0.2, 0.2, 0.5], [0.2, 0.2, -0.5]],
        );
        assert_eq!(count_intersecting_pairs(&[a, b], 1e-9), 0);
    }

    #[test]
    fn oversized_triangle_still_tested() {
        let mut tris: Vec<IndexedTriangle> = (0..20)
            .map(|i| {
                let x = f64::from(i) * 10.0;
                let base = u32::try_from(i * 3).unwrap();
                tri(
                    [base, base + 1, base + 2],
                    [[x, 0.0, 5.0], [x + 0.01, 0.0, 5.0], [x, 0.01, 5.0]],
                )
            })
            .collect();
        // Huge triangle in the z=0 plane crossed by a small vertical one.
        tris.push(tri(
            [100, 101, 102],
            [[-100.0, -100.0, 0.0], [300.0, -100.0, 0.0], [-100.0, 300.0, 0.0]],
        ));
        tris.push(tri([103, 104, 105], [[1.0, 1.0, -0.1], [1.0, 1.0, 0.1], [1.05, 1.0, 0.0]]));
        assert_eq!(count_intersecting_pairs(&tris, 1e-9), 1);
    }
}
