//! Context lifecycle across threads.

use std::sync::Arc;
use std::thread;

use scan_accuracy::{AccuracyError, AccuracyRequirements, AccuracyVerifier, ProblemKind};
use scan_types::{
    CameraState, EnvironmentSnapshot, FragmentId, Matrix4, MeshFragment, Point3, ScanFrame, ScanId,
    Timestamp,
};

fn scaled_frame(t: f64, scale: f64) -> ScanFrame {
    let fragment = MeshFragment::new(
        FragmentId(1),
        Timestamp::from_secs(t),
        vec![
            Point3::new(0.0, 0.0, -1.0),
            Point3::new(0.2, 0.0, -1.0),
            Point3::new(0.2, 0.2, -1.0),
            Point3::new(0.0, 0.2, -1.0),
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .with_transform(Matrix4::new_scaling(scale));
    ScanFrame::new(Timestamp::from_secs(t), CameraState::default()).with_fragment(fragment)
}

#[test]
fn same_scan_gets_independent_contexts() {
    let verifier = AccuracyVerifier::default();
    let snapshot = EnvironmentSnapshot::default();
    let a = verifier
        .begin_verification(ScanId(1), AccuracyRequirements::default(), &snapshot)
        .unwrap();
    let b = verifier
        .begin_verification(ScanId(1), AccuracyRequirements::default(), &snapshot)
        .unwrap();
    assert_ne!(a, b);

    verifier.verify_frame(a, &scaled_frame(0.0, 1.0)).unwrap();
    assert_eq!(verifier.measurements(a).unwrap().len(), 1);
    assert!(verifier.measurements(b).unwrap().is_empty());

    verifier.end_verification(a).unwrap();
    assert!(matches!(
        verifier.verify_frame(a, &scaled_frame(1.0, 1.0)),
        Err(AccuracyError::ContextNotFound { .. })
    ));
    verifier.verify_frame(b, &scaled_frame(1.0, 1.0)).unwrap();
}

#[test]
fn reused_slot_does_not_revive_ended_context() {
    let verifier = AccuracyVerifier::default();
    let snapshot = EnvironmentSnapshot::default();
    let old = verifier
        .begin_verification(ScanId(1), AccuracyRequirements::default(), &snapshot)
        .unwrap();
    verifier.end_verification(old).unwrap();
    let new = verifier
        .begin_verification(ScanId(2), AccuracyRequirements::default(), &snapshot)
        .unwrap();

    assert_ne!(old, new);
    assert!(verifier.measurements(old).is_err());
    assert!(verifier.measurements(new).is_ok());
}

#[test]
fn concurrent_sessions_do_not_interfere() {
    let verifier = Arc::new(AccuracyVerifier::default());
    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            let verifier = Arc::clone(&verifier);
            thread::spawn(move || {
                let ctx = verifier
                    .begin_verification(
                        ScanId(u64::from(i)),
                        AccuracyRequirements::default(),
                        &EnvironmentSnapshot::default(),
                    )
                    .unwrap();
                for t in 0..20 {
                    verifier.verify_frame(ctx, &scaled_frame(f64::from(t), 1.0)).unwrap();
                }
                verifier.end_verification(ctx).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().samples, 20);
    }
    assert_eq!(verifier.active_count(), 0);
}

#[test]
fn scale_drift_is_flagged() {
    let verifier = AccuracyVerifier::default();
    let ctx = verifier
        .begin_verification(
            ScanId(9),
            AccuracyRequirements::default(),
            &EnvironmentSnapshot::default(),
        )
        .unwrap();
    // Standard tolerance is 3%, so a 5% scale error scores zero.
    for t in 0..5 {
        verifier.verify_frame(ctx, &scaled_frame(f64::from(t), 1.05)).unwrap();
    }
    let analysis = verifier.end_verification(ctx).unwrap();
    assert!(analysis.has_problem(ProblemKind::ScaleInaccuracy));
    assert!(!analysis.meets_requirements);
}
