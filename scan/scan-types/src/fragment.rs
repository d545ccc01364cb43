//! Captured mesh fragments.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Aabb, FragmentId, Timestamp};

/// A locally captured piece of surface geometry.
///
/// Produced by the capture loop and treated as immutable by the pipeline.
/// Vertices are in the fragment's local frame; [`MeshFragment::transform`]
/// maps them into world space.
///
/// # Memory Layout
///
/// - `vertices`: positions
/// - `normals`: per-vertex normals (may be empty)
/// - `confidence`: per-vertex sensor confidence in `[0, 1]` (may be empty)
/// - `faces`: triangles as vertex index triples, counter-clockwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshFragment {
    /// Identity used to tag batch results.
    pub id: FragmentId,
    /// Capture time.
    pub timestamp: Timestamp,
    /// Vertex positions in the local frame.
    pub vertices: Vec<Point3<f64>>,
    /// Per-vertex normals. Empty when the sensor did not provide them.
    pub normals: Vec<Vector3<f64>>,
    /// Per-vertex confidence. Empty when the sensor did not provide it.
    pub confidence: Vec<f32>,
    /// Triangle list.
    pub faces: Vec<[u32; 3]>,
    /// Local-to-world transform. Nominally rigid.
    pub transform: Matrix4<f64>,
}

impl MeshFragment {
    /// Creates a fragment with an identity transform and no normals.
    #[must_use]
    pub fn new(
        id: FragmentId,
        timestamp: Timestamp,
        vertices: Vec<Point3<f64>>,
        faces: Vec<[u32; 3]>,
    ) -> Self {
        Self {
            id,
            timestamp,
            vertices,
            normals: Vec::new(),
            confidence: Vec::new(),
            faces,
            transform: Matrix4::identity(),
        }
    }

    /// Sets per-vertex normals.
    #[must_use]
    pub fn with_normals(mut self, normals: Vec<Vector3<f64>>) -> Self {
        self.normals = normals;
        self
    }

    /// Sets per-vertex confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: Vec<f32>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Sets the local-to-world transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = transform;
        self
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Returns true if the fragment has no vertices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Returns true if every index of `face` is in range and the three are distinct.
    #[must_use]
    pub fn is_well_formed(&self, face: &[u32; 3]) -> bool {
        let n = self.vertices.len();
        face.iter().all(|&i| (i as usize) < n)
            && face[0] != face[1]
            && face[1] != face[2]
            && face[0] != face[2]
    }

    /// Iterates over faces that pass [`MeshFragment::is_well_formed`].
    pub fn well_formed_faces(&self) -> impl Iterator<Item = (usize, &[u32; 3])> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(move |(_, f)| self.is_well_formed(f))
    }

    /// Corner positions of a face. Returns `None` for a malformed face.
    #[must_use]
    pub fn triangle(&self, face: &[u32; 3]) -> Option<[Point3<f64>; 3]> {
        if !self.is_well_formed(face) {
            return None;
        }
        Some([
            self.vertices[face[0] as usize],
            self.vertices[face[1] as usize],
            self.vertices[face[2] as usize],
        ])
    }

    /// Area of a face (zero for a malformed face).
    #[must_use]
    pub fn face_area(&self, face: &[u32; 3]) -> f64 {
        self.triangle(face).map_or(0.0, |[a, b, c]| triangle_area(&a, &b, &c))
    }

    /// Unit normal of a face, if the face has non-zero area.
    #[must_use]
    pub fn face_normal(&self, face: &[u32; 3]) -> Option<Vector3<f64>> {
        let [a, b, c] = self.triangle(face)?;
        (b - a).cross(&(c - a)).try_normalize(f64::EPSILON)
    }

    /// Total area of the well-formed faces, in local units.
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        self.well_formed_faces()
            .map(|(_, f)| self.face_area(f))
            .sum()
    }

    /// Number of vertices referenced by at least one well-formed face.
    #[must_use]
    pub fn referenced_vertex_count(&self) -> usize {
        let mut referenced = vec![false; self.vertices.len()];
        for (_, face) in self.well_formed_faces() {
            for &v in face {
                referenced[v as usize] = true;
            }
        }
        referenced.into_iter().filter(|&r| r).count()
    }

    /// Maps a local point into world space.
    #[must_use]
    pub fn to_world(&self, p: &Point3<f64>) -> Point3<f64> {
        self.transform.transform_point(p)
    }

    /// All vertices in world space.
    #[must_use]
    pub fn world_vertices(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|p| self.to_world(p)).collect()
    }

    /// World-space centroid of the vertices.
    #[must_use]
    pub fn world_centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.vertices.len() as f64;
        let sum: Vector3<f64> = self.vertices.iter().map(|p| self.to_world(p).coords).sum();
        Some(Point3::from(sum / n))
    }

    /// World-space bounds of the vertices.
    #[must_use]
    pub fn world_bounds(&self) -> Option<Aabb> {
        let world = self.world_vertices();
        Aabb::from_points(&world)
    }

    /// Uniform scale factor of the transform (cube root of the linear determinant).
    ///
    /// A perfectly rigid transform yields `1.0`.
    #[must_use]
    pub fn scale_factor(&self) -> f64 {
        let linear: Matrix3<f64> = self.transform.fixed_view::<3, 3>(0, 0).into_owned();
        linear.determinant().abs().cbrt()
    }

    /// Area-weighted vertex normals computed from the faces.
    #[must_use]
    pub fn compute_vertex_normals(&self) -> Vec<Vector3<f64>> {
        let mut normals = vec![Vector3::zeros(); self.vertices.len()];
        for (_, face) in self.well_formed_faces() {
            let a = self.vertices[face[0] as usize];
            let b = self.vertices[face[1] as usize];
            let c = self.vertices[face[2] as usize];
            // Cross product magnitude is twice the area, which is the weighting we want.
            let n = (b - a).cross(&(c - a));
            for &v in face {
                normals[v as usize] += n;
            }
        }
        normals
            .into_iter()
            .map(|n| n.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::zeros))
            .collect()
    }

    /// Mean per-vertex confidence, or `None` when not reported.
    #[must_use]
    pub fn mean_confidence(&self) -> Option<f64> {
        if self.confidence.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.confidence.len() as f64;
        Some(self.confidence.iter().map(|&c| f64::from(c)).sum::<f64>() / n)
    }
}

/// Area of the triangle `abc`.
#[must_use]
pub fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    (b - a).cross(&(c - a)).norm() * 0.5
}
