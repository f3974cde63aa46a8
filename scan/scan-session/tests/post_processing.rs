//! Post-processing pipeline tests: chaining, progress, cancellation and
//! busy rejection.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use glam::Vec3;
use scan_session::{
    ColorizeQuality, HoleFillAlgorithm, HoleFillParams, PipelineEvent, ScanSession,
    SessionConfig, SessionError, StageKind, TaskStatus, UserNotice,
};

use common::{FakeCapture, FakeEngine, depth_sample, sample};

type Session = ScanSession<FakeEngine, FakeCapture>;

fn viewing_with(engine: &Arc<FakeEngine>, config: SessionConfig) -> Session {
    let mut s = ScanSession::new(Arc::clone(engine), FakeCapture::default(), config).unwrap();
    s.process_sample(&depth_sample(0.0)).unwrap();
    s.trigger().unwrap();
    for step in 0..=250 {
        s.process_sample(&sample(f64::from(step) * 0.1)).unwrap();
    }
    s.trigger().unwrap();
    s
}

fn viewing(engine: &Arc<FakeEngine>) -> Session {
    viewing_with(engine, SessionConfig::default())
}

/// Poll until `done` matches an event or two seconds pass.
fn poll_until(s: &mut Session, done: impl Fn(&PipelineEvent) -> bool) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    for _ in 0..40 {
        let batch = s.poll_post_processing_timeout(Duration::from_millis(50));
        let finished = batch.iter().any(&done);
        events.extend(batch);
        if finished {
            break;
        }
    }
    events
}

/// Poll for a fixed time and return everything seen.
fn poll_for(s: &mut Session, duration: Duration) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    let steps = duration.as_millis() / 20;
    for _ in 0..steps {
        events.extend(s.poll_post_processing_timeout(Duration::from_millis(20)));
    }
    events
}

fn is_enhanced(e: &PipelineEvent) -> bool {
    matches!(e, PipelineEvent::EnhancedReady(_))
}

fn is_preview(e: &PipelineEvent) -> bool {
    matches!(e, PipelineEvent::PreviewReady(_))
}

fn shade(s: &Session) -> Option<Vec3> {
    s.mesh().and_then(|m| m.colors()).map(|c| c[0])
}

// =============================================================================
// Chaining
// =============================================================================

#[test]
fn full_chain_commits_preview_then_enhanced() {
    let engine = Arc::new(FakeEngine::default());
    let mut s = viewing(&engine);
    assert_eq!(s.keyframe_count(), 2);

    s.start_post_processing().unwrap();
    let events = poll_until(&mut s, is_enhanced);

    let preview_at = events.iter().position(is_preview).unwrap();
    let enhanced_at = events.iter().position(is_enhanced).unwrap();
    assert!(preview_at < enhanced_at);

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::Progress { percent } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|w| w[0] < w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.iter().any(|p| *p < 20));

    assert_eq!(shade(&s), Some(Vec3::splat(0.9)));
    assert!(!s.pipeline().is_busy());
    assert_eq!(s.pipeline().status(StageKind::HoleFill), TaskStatus::Completed);
    assert_eq!(s.pipeline().status(StageKind::EnhancedColorize), TaskStatus::Completed);

    assert_eq!(engine.released.load(Ordering::SeqCst), 1);
    assert_eq!(engine.hole_fill_calls.load(Ordering::SeqCst), 1);
    let calls = engine.colorize_calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![(ColorizeQuality::Preview, 2), (ColorizeQuality::Enhanced, 2)]
    );
    let options = engine.colorize_options.lock().unwrap().unwrap();
    assert_eq!(options.target_face_count, 50_000);
    assert!(options.prioritize_first_frame);
}

#[test]
fn enhanced_colorize_refines_preview_mesh() {
    let engine = Arc::new(FakeEngine::default());
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    poll_until(&mut s, is_enhanced);

    let inputs = engine.colorize_input_shades.lock().unwrap().clone();
    assert_eq!(inputs, vec![None, Some(Vec3::splat(0.5))]);
}

#[test]
fn hole_fill_failure_falls_back_to_original_mesh() {
    let engine = Arc::new(FakeEngine::default());
    engine.hole_fill_fails.store(true, Ordering::SeqCst);
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    let events = poll_until(&mut s, is_enhanced);

    assert!(matches!(events[0], PipelineEvent::HoleFillFailed { .. }));
    assert!(events.iter().any(is_preview));
    assert_eq!(s.pipeline().status(StageKind::HoleFill), TaskStatus::Failed);
    assert!(s.pipeline().failure(StageKind::HoleFill).unwrap().contains("non-manifold"));
    assert_eq!(s.mesh().unwrap().face_count(), 4);
}

#[test]
fn disabled_hole_fill_is_skipped() {
    let engine = Arc::new(FakeEngine::default());
    let config = SessionConfig {
        hole_fill: HoleFillParams {
            algorithm: HoleFillAlgorithm::Disabled,
            ..HoleFillParams::default()
        },
        ..SessionConfig::default()
    };
    let mut s = viewing_with(&engine, config);

    s.start_post_processing().unwrap();
    assert_eq!(s.pipeline().status(StageKind::HoleFill), TaskStatus::Skipped);
    poll_until(&mut s, is_enhanced);
    assert_eq!(engine.hole_fill_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn enhanced_failure_keeps_preview_mesh() {
    let engine = Arc::new(FakeEngine::default());
    engine.enhanced_fails.store(true, Ordering::SeqCst);
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    let events = poll_until(&mut s, |e| matches!(e, PipelineEvent::StageFailed { .. }));

    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::StageFailed {
            kind: StageKind::EnhancedColorize,
            ..
        }
    )));
    assert_eq!(shade(&s), Some(Vec3::splat(0.5)));
    assert!(!s.pipeline().is_busy());
}

// =============================================================================
// Busy and state checks
// =============================================================================

#[test]
fn start_while_busy_is_rejected() {
    let engine = Arc::new(FakeEngine::default());
    engine.hold_enhanced();
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    assert!(matches!(s.start_post_processing(), Err(SessionError::Busy)));

    poll_until(&mut s, is_preview);
    assert!(matches!(s.start_post_processing(), Err(SessionError::Busy)));

    engine.release_enhanced();
    poll_until(&mut s, is_enhanced);
    assert!(!s.pipeline().is_busy());
}

#[test]
fn post_processing_requires_viewing() {
    let engine = Arc::new(FakeEngine::default());
    let mut s = ScanSession::new(
        Arc::clone(&engine),
        FakeCapture::default(),
        SessionConfig::default(),
    )
    .unwrap();
    assert!(matches!(
        s.start_post_processing(),
        Err(SessionError::InvalidState { .. })
    ));
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn cancelled_result_is_discarded_when_engine_finishes_later() {
    let engine = Arc::new(FakeEngine::default());
    engine.hold_enhanced();
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    poll_until(&mut s, is_preview);
    assert!(engine.wait_for_enhanced());

    assert!(s.cancel_post_processing(StageKind::EnhancedColorize));
    assert_eq!(
        s.pipeline().status(StageKind::EnhancedColorize),
        TaskStatus::Cancelled
    );

    engine.release_enhanced();
    let late = poll_for(&mut s, Duration::from_millis(300));
    assert!(!late.iter().any(is_enhanced));
    assert!(!late.iter().any(|e| matches!(e, PipelineEvent::Progress { .. })));
    assert_eq!(shade(&s), Some(Vec3::splat(0.5)));
    assert!(!s.pipeline().is_busy());

    // A new run can start once nothing is pending.
    engine.enhanced_started.store(false, Ordering::SeqCst);
    s.start_post_processing().unwrap();
    poll_until(&mut s, is_enhanced);
    assert_eq!(shade(&s), Some(Vec3::splat(0.9)));
}

#[test]
fn cancelling_hole_fill_cancels_the_chain() {
    let engine = Arc::new(FakeEngine::default());
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    assert!(s.cancel_post_processing(StageKind::HoleFill));
    for kind in StageKind::ALL {
        assert_eq!(s.pipeline().status(kind), TaskStatus::Cancelled);
    }

    let late = poll_for(&mut s, Duration::from_millis(200));
    assert!(late.is_empty(), "{late:?}");
    assert_eq!(s.mesh().unwrap().colors(), None);
}

#[test]
fn memory_pressure_cancels_colorize_once() {
    let engine = Arc::new(FakeEngine::default());
    engine.hold_enhanced();
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    poll_until(&mut s, is_preview);
    assert!(engine.wait_for_enhanced());

    assert_eq!(
        s.handle_memory_pressure().unwrap(),
        Some(UserNotice::COLORIZE_CANCELLED_LOW_MEMORY)
    );
    assert_eq!(s.handle_memory_pressure().unwrap(), None);

    engine.release_enhanced();
    poll_for(&mut s, Duration::from_millis(200));
    assert_eq!(shade(&s), Some(Vec3::splat(0.5)));
}

#[test]
fn colorize_notice_follows_scan_stopped_notice() {
    let engine = Arc::new(FakeEngine::default());
    engine.hold_enhanced();
    let mut s = ScanSession::new(
        Arc::clone(&engine),
        FakeCapture::default(),
        SessionConfig::default(),
    )
    .unwrap();
    s.process_sample(&depth_sample(0.0)).unwrap();
    s.trigger().unwrap();
    for step in 0..=250 {
        s.process_sample(&sample(f64::from(step) * 0.1)).unwrap();
    }

    assert_eq!(
        s.handle_memory_pressure().unwrap(),
        Some(UserNotice::SCAN_STOPPED_LOW_MEMORY)
    );

    s.start_post_processing().unwrap();
    poll_until(&mut s, is_preview);
    assert!(engine.wait_for_enhanced());

    assert_eq!(
        s.handle_memory_pressure().unwrap(),
        Some(UserNotice::COLORIZE_CANCELLED_LOW_MEMORY)
    );
    assert_eq!(
        s.pipeline().status(StageKind::EnhancedColorize),
        TaskStatus::Cancelled
    );
    engine.release_enhanced();
}

#[test]
fn complete_viewing_cancels_and_resets() {
    let engine = Arc::new(FakeEngine::default());
    engine.hold_enhanced();
    let mut s = viewing(&engine);

    s.start_post_processing().unwrap();
    poll_until(&mut s, is_preview);
    s.complete_viewing();

    assert!(!s.pipeline().is_busy());
    assert!(s.mesh().is_none());
    assert!(s.capture().streaming);
    engine.release_enhanced();
}
