//! End-to-end optimization of grid fragments.

use std::sync::Arc;

use proptest::prelude::*;
use scan_optimize::{
    CpuBackend, MeshOptimizer, OptimizeError, OptimizerConfig, QualityTier,
};
use scan_types::{FragmentId, MeshFragment, Point3, Timestamp, Vector3};

/// Gently curved `n` x `n` sheet with normals and confidence.
fn sheet(id: u64, n: u32) -> MeshFragment {
    let step = 0.002;
    let mut vertices = Vec::new();
    for j in 0..n {
        for i in 0..n {
            let (x, y) = (f64::from(i) * step, f64::from(j) * step);
            vertices.push(Point3::new(x, y, 0.05 * (x * x + y * y)));
        }
    }
    let mut faces = Vec::new();
    for j in 0..n - 1 {
        for i in 0..n - 1 {
            let v = j * n + i;
            faces.push([v, v + 1, v + n + 1]);
            faces.push([v, v + n + 1, v + n]);
        }
    }
    let count = vertices.len();
    MeshFragment::new(FragmentId(id), Timestamp::from_secs(0.0), vertices, faces)
        .with_normals(vec![Vector3::z(); count])
        .with_confidence(vec![0.8; count])
}

#[test]
fn ceiling_sized_fragment_is_untouched() {
    let f = sheet(1, 100);
    assert_eq!(f.vertex_count(), 10_000);
    let out = MeshOptimizer::default().optimize(&f, QualityTier::Low).unwrap();
    assert!(!out.decimated);
    assert!(out.optimization_time.is_zero());
    assert_eq!(out.fragment.vertices, f.vertices);
    assert_eq!(out.fragment.normals, f.normals);
    assert_eq!(out.fragment.faces, f.faces);
}

#[test]
fn fragment_over_ceiling_is_simplified() {
    let f = sheet(2, 101);
    let out = MeshOptimizer::default().optimize(&f, QualityTier::High).unwrap();
    assert!(out.decimated);
    assert_eq!(out.original_vertex_count, 10_201);
    assert!(out.fragment.face_count() <= QualityTier::High.target_faces(f.face_count()));
    assert!(out.vertex_reduction() > 0.0);
    assert_eq!(out.fragment.normals.len(), out.fragment.vertex_count());
    assert_eq!(out.fragment.confidence.len(), out.fragment.vertex_count());
    assert_eq!(out.fragment.id, f.id);
}

#[test]
fn lower_tier_removes_more() {
    let config = OptimizerConfig::default().with_vertex_ceiling(100);
    let optimizer = MeshOptimizer::new(config);
    let f = sheet(3, 30);
    let high = optimizer.optimize(&f, QualityTier::High).unwrap();
    let low = optimizer.optimize(&f, QualityTier::Low).unwrap();
    assert!(low.fragment.face_count() < high.fragment.face_count());
}

#[test]
fn batch_reports_each_fragment() {
    let config = OptimizerConfig::default().with_vertex_ceiling(100);
    let backend = Arc::new(CpuBackend::from_config(&config));
    backend.set_ready(false);
    let optimizer = MeshOptimizer::with_backend(config, backend.clone());

    let fragments = vec![sheet(1, 5), sheet(2, 20), sheet(3, 6), sheet(4, 25)];
    let results = optimizer.batch_optimize(&fragments, QualityTier::Medium);
    assert_eq!(results.len(), 4);
    for (id, result) in &results {
        match id.0 {
            1 | 3 => assert!(result.as_ref().is_ok_and(|m| !m.decimated)),
            _ => assert_eq!(
                result.as_ref().unwrap_err(),
                &OptimizeError::PipelineUnavailable { backend: "cpu" }
            ),
        }
    }

    backend.set_ready(true);
    let results = optimizer.batch_optimize(&fragments, QualityTier::Medium);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn under_ceiling_is_identity(n in 2u32..40, tier_index in 0usize..3) {
        let f = sheet(7, n);
        let tier = QualityTier::ALL[tier_index];
        let out = MeshOptimizer::default().optimize(&f, tier).unwrap();
        prop_assert_eq!(&out.fragment, &f);
        prop_assert!(out.optimization_time.is_zero());
        prop_assert_eq!(out.original_face_count, f.face_count());
    }
}
