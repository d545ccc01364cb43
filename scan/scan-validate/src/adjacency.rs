//! Edge adjacency over the usable faces of a fragment.

use hashbrown::HashMap;

/// One face incident to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeUse {
    /// Index into the face list the adjacency was built from.
    pub face: usize,
    /// True if the face traverses the edge from its lower to its higher vertex.
    pub forward: bool,
}

/// Edge-to-face adjacency for a triangle list.
///
/// Edges are keyed `(min, max)`; each use remembers its traversal direction so
/// winding consistency can be checked.
#[derive(Debug, Clone, Default)]
pub(crate) struct FaceAdjacency {
    edge_to_faces: HashMap<(u32, u32), Vec<EdgeUse>>,
    face_count: usize,
}

impl FaceAdjacency {
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<EdgeUse>> = HashMap::new();
        for (face, tri) in faces.iter().enumerate() {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
                edge_to_faces
                    .entry(normalize_edge(a, b))
                    .or_default()
                    .push(EdgeUse {
                        face,
                        forward: a < b,
                    });
            }
        }
        Self {
            edge_to_faces,
            face_count: faces.len(),
        }
    }

    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces.values().filter(|u| u.len() > 2).count()
    }

    pub fn boundary_edges(&self) -> impl Iterator<Item = ((u32, u32), usize)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, uses)| uses.len() == 1)
            .map(|(&edge, uses)| (edge, uses[0].face))
    }

    /// Edges shared by exactly two faces, with both uses.
    pub fn interior_edges(&self) -> impl Iterator<Item = (EdgeUse, EdgeUse)> + '_ {
        self.edge_to_faces
            .values()
            .filter(|uses| uses.len() == 2)
            .map(|uses| (uses[0], uses[1]))
    }

    /// Interior edges whose two faces traverse them in the same direction.
    pub fn inconsistent_edge_count(&self) -> usize {
        self.interior_edges()
            .filter(|(a, b)| a.forward == b.forward)
            .count()
    }

    /// Face-connected component id for every face.
    pub fn face_components(&self) -> Vec<usize> {
        let mut sets = DisjointSet::new(self.face_count);
        for uses in self.edge_to_faces.values() {
            for pair in uses.windows(2) {
                sets.union(pair[0].face, pair[1].face);
            }
        }
        (0..self.face_count).map(|f| sets.find(f)).collect()
    }

    /// Number of closed boundary loops and of components that own one.
    pub fn boundary_loops(&self) -> (usize, usize) {
        let edges: Vec<((u32, u32), usize)> = self.boundary_edges().collect();
        if edges.is_empty() {
            return (0, 0);
        }

        let mut index: HashMap<u32, usize> = HashMap::new();
        for ((a, b), _) in &edges {
            let next = index.len();
            index.entry(*a).or_insert(next);
            let next = index.len();
            index.entry(*b).or_insert(next);
        }
        let mut rims = DisjointSet::new(index.len());
        for ((a, b), _) in &edges {
            if let (Some(&ia), Some(&ib)) = (index.get(a), index.get(b)) {
                rims.union(ia, ib);
            }
        }
        let mut loop_roots: Vec<usize> = (0..index.len()).map(|i| rims.find(i)).collect();
        loop_roots.sort_unstable();
        loop_roots.dedup();

        let components = self.face_components();
        let mut open_components: Vec<usize> = edges
            .iter()
            .filter_map(|(_, face)| components.get(*face).copied())
            .collect();
        open_components.sort_unstable();
        open_components.dedup();

        (loop_roots.len(), open_components.len())
    }
}

/// Normalize edge direction so v0 < v1.
#[inline]
fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}

/// Union-find with path halving.
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_triangles_share_interior_edge() {
        let adj = FaceAdjacency::build(&[[0, 1, 2], [2, 1, 3]]);
        assert_eq!(adj.interior_edges().count(), 1);
        assert_eq!(adj.inconsistent_edge_count(), 0);
        assert_eq!(adj.boundary_edges().count(), 4);
        assert_eq!(adj.boundary_loops(), (1, 1));
    }

    #[test]
    fn flipped_face_is_inconsistent() {
        let adj = FaceAdjacency::build(&[[0, 1, 2], [1, 2, 3]]);
        assert_eq!(adj.inconsistent_edge_count(), 1);
    }

    #[test]
    fn non_manifold_fan() {
        let adj = FaceAdjacency::build(&[[0, 1, 2], [1, 0, 3], [0, 1, 4]]);
        assert_eq!(adj.non_manifold_edge_count(), 1);
    }

    #[test]
    fn separate_patches_are_separate_components() {
        let adj = FaceAdjacency::build(&[[0, 1, 2], [3, 4, 5]]);
        let comps = adj.face_components();
        assert_ne!(comps[0], comps[1]);
        assert_eq!(adj.boundary_loops(), (2, 2));
    }
}
