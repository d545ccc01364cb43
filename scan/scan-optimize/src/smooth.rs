//! Umbrella-operator Laplacian smoothing.
//!
//! Each pass moves every vertex a fraction `lambda` of the way to the centroid
//! of its one-ring: `v' = v + λ (c(N(v)) - v)`. Positions for a pass are
//! computed in parallel from the previous pass only.

use nalgebra::Point3;
use rayon::prelude::*;
use scan_types::MeshFragment;

use hashbrown::HashMap;

fn one_rings(fragment: &MeshFragment) -> (Vec<Vec<u32>>, Vec<bool>) {
    let n = fragment.vertex_count();
    let mut rings: Vec<Vec<u32>> = vec![Vec::new(); n];
    let mut edge_uses: HashMap<(u32, u32), u32> = HashMap::new();
    for (_, face) in fragment.well_formed_faces() {
        for k in 0..3 {
            let (a, b) = (face[k], face[(k + 1) % 3]);
            if a == b {
                continue;
            }
            rings[a as usize].push(b);
            rings[b as usize].push(a);
            *edge_uses.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }
    for ring in &mut rings {
        ring.sort_unstable();
        ring.dedup();
    }
    let mut boundary = vec![false; n];
    for ((a, b), uses) in edge_uses {
        if uses == 1 {
            boundary[a as usize] = true;
            boundary[b as usize] = true;
        }
    }
    (rings, boundary)
}

/// Runs `iterations` Laplacian passes.
///
/// Vertices no face references never move. With `preserve_boundary`, open
/// boundary vertices stay fixed too. Normals are recomputed when the input
/// carried them; faces, confidence and transform are kept as they are.
#[must_use]
pub fn laplacian_smooth(
    fragment: &MeshFragment,
    iterations: u32,
    lambda: f64,
    preserve_boundary: bool,
) -> MeshFragment {
    let mut out = fragment.clone();
    if iterations == 0 || lambda == 0.0 || fragment.faces.is_empty() {
        return out;
    }

    let (rings, boundary) = one_rings(fragment);
    for _ in 0..iterations {
        let current = &out.vertices;
        let next: Vec<Point3<f64>> = (0..current.len())
            .into_par_iter()
            .map(|i| {
                let ring = &rings[i];
                if ring.is_empty() || (preserve_boundary && boundary[i]) {
                    return current[i];
                }
                #[allow(clippy::cast_precision_loss)]
                let k = ring.len() as f64;
                let centroid = ring
                    .iter()
                    .fold(nalgebra::Vector3::zeros(), |acc, &j| acc + current[j as usize].coords)
                    / k;
                current[i] + (centroid - current[i].coords) * lambda
            })
            .collect();
        out.vertices = next;
    }

    if !fragment.normals.is_empty() {
        out.normals = out.compute_vertex_normals();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimate::tests::grid;
    use approx::assert_relative_eq;

    fn bumped(n: u32) -> (MeshFragment, usize) {
        let mut g = grid(n, 0.01);
        let center = (n / 2 * n + n / 2) as usize;
        g.vertices[center].z = 0.005;
        (g, center)
    }

    #[test]
    fn zero_lambda_is_identity() {
        let (g, _) = bumped(5);
        let s = laplacian_smooth(&g, 3, 0.0, true);
        assert_eq!(s.vertices, g.vertices);
    }

    #[test]
    fn bump_is_flattened() {
        let (g, center) = bumped(7);
        let once = laplacian_smooth(&g, 1, 0.5, true);
        let thrice = laplacian_smooth(&g, 3, 0.5, true);
        assert!(once.vertices[center].z < g.vertices[center].z);
        assert!(thrice.vertices[center].z < once.vertices[center].z);
    }

    #[test]
    fn flat_grid_does_not_move() {
        let g = grid(6, 0.01);
        let s = laplacian_smooth(&g, 2, 0.5, true);
        for (a, b) in s.vertices.iter().zip(&g.vertices) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn boundary_is_pinned() {
        let mut g = grid(5, 0.01);
        g.vertices[0].z = 0.01;
        let s = laplacian_smooth(&g, 2, 0.5, true);
        assert_relative_eq!(s.vertices[0].z, 0.01);

        let free = laplacian_smooth(&g, 2, 0.5, false);
        assert!(free.vertices[0].z < 0.01);
    }

    #[test]
    fn topology_is_untouched() {
        let (g, _) = bumped(5);
        let n = g.vertex_count();
        let g = g.with_confidence(vec![0.5; n]);
        let s = laplacian_smooth(&g, 2, 0.5, true);
        assert_eq!(s.faces, g.faces);
        assert_eq!(s.confidence, g.confidence);
        assert_eq!(s.id, g.id);
    }
}
