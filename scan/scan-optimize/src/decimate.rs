//! Edge-collapse decimation driven by quadric error.
//!
//! Candidate edges sit in a min-heap keyed by the error of collapsing them.
//! Each collapse merges one vertex into the other, sums their quadrics and
//! requeues the survivor's edges. Stale heap entries are skipped by comparing
//! per-vertex version stamps instead of rebuilding the heap.
//!
//! A collapse is refused when it would pinch the surface (more than two
//! shared neighbors) or flip a face. With boundary preservation on, edges
//! between two boundary vertices never collapse and an edge with one
//! boundary end collapses onto that end.

// Mesh indices fit in u32 by construction.
#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use scan_types::MeshFragment;
use tracing::debug;

use crate::Quadric;

/// Minimum cosine between a face normal before and after a collapse.
const FLIP_COS_LIMIT: f64 = 0.2;

/// Outcome of [`decimate`].
#[derive(Debug, Clone)]
pub struct Decimation {
    /// Simplified fragment, compacted and with normals recomputed when the
    /// input carried them.
    pub fragment: MeshFragment,
    /// Edges collapsed.
    pub collapses: usize,
    /// Candidates refused by the pinch, flip or boundary checks.
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    cost: f64,
    keep: u32,
    drop: u32,
    target: Point3<f64>,
    stamp: (u32, u32),
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so BinaryHeap pops the cheapest collapse.
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.total_cmp(&self.cost)
    }
}

struct Working {
    positions: Vec<Point3<f64>>,
    confidence: Vec<f32>,
    quadrics: Vec<Quadric>,
    faces: Vec<Option<[u32; 3]>>,
    incident: Vec<Vec<usize>>,
    boundary: Vec<bool>,
    alive: Vec<bool>,
    version: Vec<u32>,
    preserve_boundary: bool,
}

impl Working {
    fn new(fragment: &MeshFragment, preserve_boundary: bool) -> Self {
        let n = fragment.vertex_count();
        let faces: Vec<Option<[u32; 3]>> = fragment
            .well_formed_faces()
            .map(|(_, f)| *f)
            .filter(|f| f[0] != f[1] && f[1] != f[2] && f[0] != f[2])
            .map(Some)
            .collect();

        let mut incident = vec![Vec::new(); n];
        let mut quadrics = vec![Quadric::default(); n];
        let mut edge_uses: HashMap<(u32, u32), u32> = HashMap::new();
        for (i, face) in faces.iter().flatten().enumerate() {
            let [a, b, c] = face.map(|v| fragment.vertices[v as usize]);
            if let Some(normal) = (b - a).cross(&(c - a)).try_normalize(1e-12) {
                let q = Quadric::from_plane(&normal, &a);
                for &v in face {
                    quadrics[v as usize] += q;
                }
            }
            for k in 0..3 {
                incident[face[k] as usize].push(i);
                *edge_uses.entry(edge_key(face[k], face[(k + 1) % 3])).or_default() += 1;
            }
        }

        let mut boundary = vec![false; n];
        for ((a, b), uses) in edge_uses {
            if uses == 1 {
                boundary[a as usize] = true;
                boundary[b as usize] = true;
            }
        }

        let confidence = if fragment.confidence.len() == n {
            fragment.confidence.clone()
        } else {
            Vec::new()
        };

        Self {
            positions: fragment.vertices.clone(),
            confidence,
            quadrics,
            faces,
            incident,
            boundary,
            alive: vec![true; n],
            version: vec![0; n],
            preserve_boundary,
        }
    }

    fn active_faces(&self) -> usize {
        self.faces.iter().flatten().count()
    }

    fn neighbors(&self, v: u32) -> Vec<u32> {
        let mut out: Vec<u32> = self.incident[v as usize]
            .iter()
            .filter_map(|&f| self.faces[f])
            .flat_map(IntoIterator::into_iter)
            .filter(|&u| u != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn candidate(&self, a: u32, b: u32) -> Option<Candidate> {
        let (ba, bb) = (self.boundary[a as usize], self.boundary[b as usize]);
        let (keep, drop) = if self.preserve_boundary {
            match (ba, bb) {
                (true, true) => return None,
                (false, true) => (b, a),
                _ => (a, b),
            }
        } else {
            (a, b)
        };
        let q = self.quadrics[keep as usize] + self.quadrics[drop as usize];
        let pk = self.positions[keep as usize];
        let pd = self.positions[drop as usize];

        let target = if self.preserve_boundary && (ba || bb) {
            pk
        } else {
            let mid = nalgebra::center(&pk, &pd);
            let reach = (pk - pd).norm() * 2.0;
            let mut options = vec![pk, pd, mid];
            if let Some(m) = q.minimizer().filter(|m| (*m - mid).norm() <= reach) {
                options.push(m);
            }
            options
                .into_iter()
                .min_by(|x, y| q.error(x).total_cmp(&q.error(y)))
                .unwrap_or(mid)
        };

        Some(Candidate {
            cost: q.error(&target).max(0.0),
            keep,
            drop,
            target,
            stamp: (self.version[keep as usize], self.version[drop as usize]),
        })
    }

    fn is_current(&self, c: &Candidate) -> bool {
        self.alive[c.keep as usize]
            && self.alive[c.drop as usize]
            && self.version[c.keep as usize] == c.stamp.0
            && self.version[c.drop as usize] == c.stamp.1
    }

    fn pinches(&self, c: &Candidate) -> bool {
        let nk = self.neighbors(c.keep);
        let nd = self.neighbors(c.drop);
        nd.iter().filter(|v| nk.binary_search(v).is_ok()).count() > 2
    }

    fn flips(&self, c: &Candidate) -> bool {
        [c.keep, c.drop].iter().any(|&moved| {
            self.incident[moved as usize]
                .iter()
                .filter_map(|&f| self.faces[f])
                .filter(|face| !(face.contains(&c.keep) && face.contains(&c.drop)))
                .any(|face| {
                    let before = face.map(|v| self.positions[v as usize]);
                    let after = face.map(|v| {
                        if v == moved {
                            c.target
                        } else {
                            self.positions[v as usize]
                        }
                    });
                    match (tri_normal(&before), tri_normal(&after)) {
                        (Some(n0), Some(n1)) => n0.dot(&n1) < FLIP_COS_LIMIT,
                        (Some(_), None) => true,
                        _ => false,
                    }
                })
        })
    }

    /// Merges `drop` into `keep`. Returns the number of faces removed.
    fn collapse(&mut self, c: &Candidate) -> usize {
        let (keep, drop) = (c.keep as usize, c.drop as usize);
        self.positions[keep] = c.target;
        let q = self.quadrics[drop];
        self.quadrics[keep] += q;
        if !self.confidence.is_empty() {
            self.confidence[keep] = self.confidence[keep].min(self.confidence[drop]);
        }
        self.boundary[keep] |= self.boundary[drop];
        self.alive[drop] = false;

        let mut removed = 0;
        for f in std::mem::take(&mut self.incident[drop]) {
            let Some(face) = self.faces[f].as_mut() else {
                continue;
            };
            if face.contains(&c.keep) {
                self.faces[f] = None;
                removed += 1;
            } else {
                for v in face.iter_mut() {
                    if *v == c.drop {
                        *v = c.keep;
                    }
                }
                self.incident[keep].push(f);
            }
        }
        let faces = &self.faces;
        self.incident[keep].retain(|&f| faces[f].is_some());
        self.version[keep] += 1;
        self.version[drop] += 1;
        removed
    }

    fn into_fragment(self, source: &MeshFragment) -> MeshFragment {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut vertices = Vec::new();
        let mut confidence = Vec::new();
        let mut faces = Vec::new();
        for face in self.faces.into_iter().flatten() {
            let mapped = face.map(|v| {
                let slot = &mut remap[v as usize];
                if *slot == u32::MAX {
                    *slot = vertices.len() as u32;
                    vertices.push(self.positions[v as usize]);
                    if !self.confidence.is_empty() {
                        confidence.push(self.confidence[v as usize]);
                    }
                }
                *slot
            });
            faces.push(mapped);
        }

        let mut out = MeshFragment::new(source.id, source.timestamp, vertices, faces)
            .with_confidence(confidence)
            .with_transform(source.transform);
        if !source.normals.is_empty() {
            let normals = out.compute_vertex_normals();
            out = out.with_normals(normals);
        }
        out
    }
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

fn tri_normal(t: &[Point3<f64>; 3]) -> Option<Vector3<f64>> {
    (t[1] - t[0]).cross(&(t[2] - t[0])).try_normalize(1e-15)
}

/// Collapses edges until at most `target_faces` faces remain or no legal
/// collapse is left.
///
/// Faces with out-of-range or repeated indices are dropped up front.
/// Vertices no face references after simplification are removed.
#[must_use]
pub fn decimate(fragment: &MeshFragment, target_faces: usize, preserve_boundary: bool) -> Decimation {
    let mut work = Working::new(fragment, preserve_boundary);
    let mut active = work.active_faces();
    if active <= target_faces {
        return Decimation {
            fragment: work.into_fragment(fragment),
            collapses: 0,
            rejected: 0,
        };
    }

    let mut heap = BinaryHeap::new();
    let mut seen = hashbrown::HashSet::new();
    for face in work.faces.iter().flatten() {
        for k in 0..3 {
            let (a, b) = edge_key(face[k], face[(k + 1) % 3]);
            if seen.insert((a, b)) {
                heap.extend(work.candidate(a, b));
            }
        }
    }

    let mut collapses = 0;
    let mut rejected = 0;
    while active > target_faces {
        let Some(c) = heap.pop() else {
            break;
        };
        if !work.is_current(&c) {
            continue;
        }
        if work.pinches(&c) || work.flips(&c) {
            rejected += 1;
            continue;
        }
        active -= work.collapse(&c);
        collapses += 1;
        for n in work.neighbors(c.keep) {
            heap.extend(work.candidate(c.keep, n));
        }
    }

    debug!(
        fragment = %fragment.id,
        faces_before = fragment.face_count(),
        faces_after = active,
        collapses,
        rejected,
        "fragment decimated"
    );
    Decimation {
        fragment: work.into_fragment(fragment),
        collapses,
        rejected,
    }
}
