//! End-to-end runs of the scan pipeline.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use scan_calibration::EnvironmentType;
use scan_governor::{GovernorConfig, ResourceKind, ResourceQuota, RetryPolicy};
use scan_optimize::{CpuBackend, OptimizeError, OptimizerConfig};
use scan_pipeline::{Collaborators, PipelineConfig, PipelineError, ScanPipeline};
use scan_recovery::{InterruptionType, MonitorEvent, SessionSignal};
use scan_types::{
    CameraState, EnvironmentSnapshot, FragmentId, MemoryAnalytics, MemoryAuditLog, MemoryStorage,
    MeshFragment, Point3, ScanFrame, ScanId, Timestamp,
};
use scan_validate::ValidateError;

/// Flat `n`×`n` grid half a meter in front of the camera.
fn grid(id: u64, n: u32, spacing: f64) -> MeshFragment {
    let mut vertices = Vec::new();
    for y in 0..n {
        for x in 0..n {
            vertices.push(Point3::new(
                f64::from(x) * spacing,
                f64::from(y) * spacing,
                -0.5,
            ));
        }
    }
    let mut faces = Vec::new();
    for y in 0..n - 1 {
        for x in 0..n - 1 {
            let i = y * n + x;
            faces.push([i, i + 1, i + n + 1]);
            faces.push([i, i + n + 1, i + n]);
        }
    }
    MeshFragment::new(FragmentId(id), Timestamp::from_secs(0.0), vertices, faces)
}

fn frame(t: f64, fragments: Vec<MeshFragment>) -> ScanFrame {
    fragments.into_iter().fold(
        ScanFrame::new(Timestamp::from_secs(t), CameraState::default()),
        ScanFrame::with_fragment,
    )
}

fn begin(pipeline: &ScanPipeline, scan: u64, environment: EnvironmentType) {
    pipeline
        .begin_scan(ScanId(scan), environment, &EnvironmentSnapshot::default())
        .unwrap();
}

#[test]
fn frames_flow_through_every_stage() {
    let analytics = Arc::new(MemoryAnalytics::new());
    let pipeline = ScanPipeline::new(
        PipelineConfig::headless(),
        Collaborators::default().with_analytics(analytics.clone()),
    );
    begin(&pipeline, 1, EnvironmentType::Dental);
    assert!(pipeline.is_active(ScanId(1)));

    for i in 0..3 {
        let report = pipeline
            .process_frame(ScanId(1), &frame(f64::from(i), vec![grid(1, 6, 0.005)]))
            .unwrap();
        assert_eq!(report.accepted(), 1);
        assert_eq!(report.optimized.len(), 1);
        assert!(report.collision.is_some());
        assert!(report.environment.is_some());
        assert!(report.calibration.is_some());
        assert!(report.is_clear());
    }
    assert_eq!(pipeline.validator().validation_history(ScanId(1)).len(), 3);

    let summary = pipeline.end_scan(ScanId(1)).unwrap();
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.accepted_fragments, 3);
    assert_eq!(summary.rejected_fragments, 0);
    assert_eq!(summary.analysis.samples, 3);
    assert_eq!(summary.profile.environment, EnvironmentType::Dental);
    assert_eq!(summary.profile.sessions_completed, 1);

    assert!(!pipeline.is_active(ScanId(1)));
    assert_eq!(pipeline.verifier().active_count(), 0);
    assert_eq!(pipeline.collision().active_count(), 0);
    assert_eq!(pipeline.environment().active_count(), 0);
    assert!(!pipeline.recovery().is_monitoring(ScanId(1)));
    assert!(pipeline.validator().validation_history(ScanId(1)).is_empty());

    assert_eq!(analytics.count("scan.started"), 1);
    assert_eq!(analytics.count("scan.frame_processed"), 3);
    assert_eq!(analytics.count("scan.completed"), 1);
}

#[test]
fn rejected_fragments_are_not_optimized() {
    let pipeline = ScanPipeline::new(PipelineConfig::headless(), Collaborators::default());
    begin(&pipeline, 1, EnvironmentType::Research);

    let mut broken = grid(2, 4, 0.005);
    broken.faces.push([0, 1, 999]);
    let report = pipeline
        .process_frame(ScanId(1), &frame(0.0, vec![grid(1, 4, 0.005), broken]))
        .unwrap();

    assert_eq!(report.validations.len(), 2);
    assert!(report.validations[0].is_valid);
    assert!(!report.validations[1].is_valid);
    assert_eq!(report.rejected(), 1);
    let ids: Vec<_> = report.optimized.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![FragmentId(1)]);

    let summary = pipeline.end_scan(ScanId(1)).unwrap();
    assert_eq!(summary.rejected_fragments, 1);
}

#[test]
fn malformed_fragment_fails_the_frame() {
    let pipeline = ScanPipeline::new(PipelineConfig::headless(), Collaborators::default());
    begin(&pipeline, 1, EnvironmentType::Research);

    let mut malformed = grid(3, 4, 0.005);
    malformed.confidence = vec![1.0; 2];
    let err = pipeline
        .process_frame(ScanId(1), &frame(0.0, vec![grid(1, 4, 0.005), malformed]))
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validate(ValidateError::MalformedFragment { fragment: FragmentId(3), .. })
    ));

    // The well-formed fragment's result is not kept either.
    assert!(pipeline.validator().validation_history(ScanId(1)).is_empty());

    // The failed frame is not counted or measured.
    let summary = pipeline.end_scan(ScanId(1)).unwrap();
    assert_eq!(summary.frames, 0);
    assert_eq!(summary.analysis.samples, 0);
}

#[test]
fn unknown_and_duplicate_scans_are_rejected() {
    let pipeline = ScanPipeline::new(PipelineConfig::headless(), Collaborators::default());
    let empty = frame(0.0, Vec::new());

    assert!(matches!(
        pipeline.process_frame(ScanId(5), &empty),
        Err(PipelineError::ScanNotFound { scan: ScanId(5) })
    ));
    assert!(matches!(
        pipeline.end_scan(ScanId(5)),
        Err(PipelineError::ScanNotFound { .. })
    ));

    begin(&pipeline, 5, EnvironmentType::Medical);
    let again = pipeline.begin_scan(ScanId(5), EnvironmentType::Medical, &EnvironmentSnapshot::default());
    assert!(matches!(again, Err(PipelineError::ScanActive { scan: ScanId(5) })));

    pipeline.end_scan(ScanId(5)).unwrap();
    assert!(pipeline.end_scan(ScanId(5)).is_err());
}

#[test]
fn exhausted_quota_refuses_the_frame_only() {
    let analytics = Arc::new(MemoryAnalytics::new());
    let quota = ResourceQuota {
        memory_bytes: 1_000,
        ..ResourceQuota::default()
    };
    let governor = GovernorConfig {
        retry: RetryPolicy::immediate(1),
        ..GovernorConfig::default().with_quota(quota)
    };
    let pipeline = ScanPipeline::new(
        PipelineConfig::headless().with_governor(governor),
        Collaborators::default().with_analytics(analytics.clone()),
    );
    begin(&pipeline, 1, EnvironmentType::Research);

    // 36 vertices at 64 bytes each exceed the 1000-byte quota.
    let err = pipeline
        .process_frame(ScanId(1), &frame(0.0, vec![grid(1, 6, 0.005)]))
        .unwrap_err();
    assert!(err.is_retryable());
    match err {
        PipelineError::Governor(e) => assert_eq!(e.kind(), ResourceKind::Memory),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(analytics.count("scan.frame_refused"), 1);

    // A smaller frame still gets through and the lease is returned.
    pipeline
        .process_frame(ScanId(1), &frame(1.0, vec![grid(1, 3, 0.005)]))
        .unwrap();
    assert_eq!(pipeline.governor().active_leases(), 0);
    assert_eq!(pipeline.end_scan(ScanId(1)).unwrap().frames, 1);
}

#[test]
fn large_fragments_are_simplified() {
    let config = PipelineConfig {
        optimizer: OptimizerConfig::default().with_vertex_ceiling(10),
        ..PipelineConfig::headless()
    };
    let pipeline = ScanPipeline::new(config, Collaborators::default());
    begin(&pipeline, 1, EnvironmentType::Research);

    let report = pipeline
        .process_frame(ScanId(1), &frame(0.0, vec![grid(1, 6, 0.005)]))
        .unwrap();
    let (_, result) = &report.optimized[0];
    let mesh = result.as_ref().unwrap();
    assert!(mesh.decimated);
    assert_eq!(mesh.original_vertex_count, 36);
    assert!(mesh.fragment.face_count() < mesh.original_face_count);
}

#[test]
fn backend_outage_is_reported_per_fragment() {
    let backend = Arc::new(CpuBackend::default());
    backend.set_ready(false);
    let config = PipelineConfig {
        optimizer: OptimizerConfig::default().with_vertex_ceiling(10),
        ..PipelineConfig::headless()
    };
    let pipeline = ScanPipeline::new(config, Collaborators::default().with_backend(backend.clone()));
    begin(&pipeline, 1, EnvironmentType::Research);

    let report = pipeline
        .process_frame(
            ScanId(1),
            &frame(0.0, vec![grid(1, 6, 0.005), grid(2, 3, 0.005)]),
        )
        .unwrap();
    assert_eq!(report.accepted(), 2);
    for (id, result) in &report.optimized {
        match *id {
            // Over the ceiling: needs the backend.
            FragmentId(1) => assert_eq!(
                result.as_ref().unwrap_err(),
                &OptimizeError::PipelineUnavailable { backend: "cpu" }
            ),
            // Under the ceiling: returned as is.
            _ => assert!(!result.as_ref().unwrap().decimated),
        }
    }
}

#[test]
fn interruptions_reach_the_monitor() {
    let pipeline = ScanPipeline::new(PipelineConfig::headless(), Collaborators::default());
    begin(&pipeline, 1, EnvironmentType::Research);

    assert!(pipeline
        .report_event(ScanId(1), MonitorEvent::Session(SessionSignal::Paused))
        .unwrap());

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut outcomes = Vec::new();
    while outcomes.is_empty() && Instant::now() < deadline {
        outcomes.extend(pipeline.recovery_outcomes(ScanId(1)).unwrap());
        thread::sleep(Duration::from_millis(10));
    }
    let report = outcomes.remove(0).unwrap();
    assert_eq!(report.interruption, InterruptionType::SessionInterrupted);
    assert_eq!(pipeline.recovery().interruption_count(ScanId(1)), Some(1));

    pipeline.end_scan(ScanId(1)).unwrap();
    assert!(matches!(
        pipeline.report_event(ScanId(1), MonitorEvent::Session(SessionSignal::Resumed)),
        Err(PipelineError::ScanNotFound { .. })
    ));
}

#[test]
fn checkpoints_and_profiles_persist_across_pipelines() {
    let storage = Arc::new(MemoryStorage::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let collaborators = Collaborators::default().with_storage(storage.clone(), audit.clone());

    let pipeline = ScanPipeline::new(PipelineConfig::headless(), collaborators.clone());
    begin(&pipeline, 1, EnvironmentType::Dental);
    let first = frame(0.0, vec![grid(1, 6, 0.005)]);
    pipeline.process_frame(ScanId(1), &first).unwrap();
    let point = pipeline.checkpoint(ScanId(1), "start", &first).unwrap();
    assert_eq!(point.vertex_count(), 36);
    pipeline.end_scan(ScanId(1)).unwrap();

    let keys = storage.keys();
    assert!(keys.contains(&"recovery/scan-1/start".to_string()));
    assert!(keys.contains(&"calibration/profile/dental".to_string()));
    assert!(audit.records().is_empty());
    drop(pipeline);

    let restarted = ScanPipeline::new(PipelineConfig::headless(), collaborators);
    assert_eq!(
        restarted
            .calibration()
            .profile(EnvironmentType::Dental)
            .sessions_completed,
        1
    );
    assert!(matches!(
        restarted.checkpoint(ScanId(1), "late", &first),
        Err(PipelineError::ScanNotFound { .. })
    ));
}

#[test]
fn concurrent_scans_stay_isolated() {
    let pipeline = Arc::new(ScanPipeline::new(PipelineConfig::headless(), Collaborators::default()));

    let handles: Vec<_> = (1..=4_u64)
        .map(|scan| {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                begin(&pipeline, scan, EnvironmentType::Research);
                let frames = u32::try_from(scan).unwrap() + 1;
                for i in 0..frames {
                    pipeline
                        .process_frame(ScanId(scan), &frame(f64::from(i), vec![grid(scan, 4, 0.005)]))
                        .unwrap();
                }
                pipeline.end_scan(ScanId(scan)).unwrap()
            })
        })
        .collect();

    for (scan, handle) in (1..=4_u64).zip(handles) {
        let summary = handle.join().unwrap();
        assert_eq!(summary.scan, ScanId(scan));
        assert_eq!(summary.frames, scan + 1);
        assert_eq!(summary.analysis.samples, usize::try_from(scan + 1).unwrap());
    }
    assert!(pipeline.active_scans().is_empty());
    assert_eq!(
        pipeline.calibration().profile(EnvironmentType::Research).sessions_completed,
        4
    );
}
