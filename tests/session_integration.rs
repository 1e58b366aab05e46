//! Integration tests for the exam session lifecycle
//!
//! Covers:
//! - Clock expiry and the clock floor
//! - Violation escalation firing exactly once
//! - Manual submit racing the clock
//! - Answer snapshot isolation
//! - Transport invocation counts across Failed -> retry
//! - AlreadyCompleted short-circuiting session creation

use examguard::config::ExamConfig;
use examguard::core::{
    demo_paper, ExamSession, InMemoryTransport, PresenceReading, RecordOutcome, RecordingViewport,
    ViolationLedger,
};
use examguard::error::{PresenceError, StartError, TransportError};
use examguard::types::{
    OptionLabel, ReasonCode, SessionState, SubmissionTrigger, Violation, ViolationKind,
};
use pretty_assertions::assert_eq;

fn config(duration_secs: u64, max_violations: u32) -> ExamConfig {
    ExamConfig {
        duration_secs,
        max_violations,
        shuffle_seed: Some(7),
        ..ExamConfig::default()
    }
}

fn started(duration_secs: u64, max_violations: u32) -> ExamSession {
    let mut session =
        ExamSession::from_start(demo_paper("Asha", "R-1"), &config(duration_secs, max_violations)).unwrap();
    session.start(&mut RecordingViewport::new());
    session
}

#[test]
fn test_two_second_exam_expires_after_two_ticks() {
    let mut session = started(2, 3);
    session.set_answer(3, OptionLabel::C);

    let first = session.tick();
    assert_eq!(first.reason, ReasonCode::R103_CLOCK_TICK);
    assert_eq!(first.time_remaining, 1);
    session.set_answer(5, OptionLabel::A);

    let second = session.tick();
    assert_eq!(second.reason, ReasonCode::R104_TIME_EXPIRED);
    assert_eq!(second.time_remaining, 0);

    let record = session.record().unwrap();
    assert_eq!(record.triggered_by, SubmissionTrigger::TimeExpired);
    assert_eq!(record.answers.len(), 2);
    assert_eq!(record.answers.get(3), Some(OptionLabel::C));
    assert_eq!(record.answers.get(5), Some(OptionLabel::A));
}

#[test]
fn test_clock_floor() {
    let mut session = started(2, 3);
    let mut expired = 0;
    for _ in 0..50 {
        if session.tick().reason == ReasonCode::R104_TIME_EXPIRED {
            expired += 1;
        }
    }
    assert_eq!(expired, 1);
    assert_eq!(session.time_remaining(), 0);
}

#[test]
fn test_three_face_missing_escalates_once() {
    let mut session = started(2700, 3);

    let a = session.observe_presence(PresenceReading::Faces(0));
    let b = session.observe_presence(PresenceReading::Faces(0));
    assert_eq!(a.reason, ReasonCode::R202_FACE_MISSING);
    assert_eq!(b.reason, ReasonCode::R202_FACE_MISSING);
    assert_eq!(session.state(), SessionState::Active);

    let third = session.observe_presence(PresenceReading::Faces(0));
    assert_eq!(third.reason, ReasonCode::R208_THRESHOLD_REACHED);
    assert_eq!(third.state, SessionState::Submitting);
    assert_eq!(third.violation_count, 3);

    // Fourth arrives immediately after: no re-escalation, no second record
    let digest = session.record().unwrap().digest();
    let fourth = session.observe_presence(PresenceReading::Faces(0));
    assert_eq!(fourth.reason, ReasonCode::R105_SESSION_NOT_ACTIVE);
    assert_eq!(fourth.violation_count, 3);
    assert_eq!(session.record().unwrap().digest(), digest);
    assert_eq!(session.record().unwrap().triggered_by, SubmissionTrigger::ViolationThreshold);
}

#[test]
fn test_ledger_max_plus_five_fires_once() {
    let mut ledger = ViolationLedger::new(3);
    let outcomes: Vec<RecordOutcome> = (0..8).map(|_| ledger.record(Violation::face_missing())).collect();

    let escalations = outcomes
        .iter()
        .filter(|o| matches!(o, RecordOutcome::ThresholdReached { .. }))
        .count();
    assert_eq!(escalations, 1);
    assert_eq!(outcomes[2], RecordOutcome::ThresholdReached { count: 3 });
    assert_eq!(ledger.count(), 3);
    assert!(outcomes[3..]
        .iter()
        .all(|o| matches!(o, RecordOutcome::AlreadyEscalated { count: 3 })));
}

#[test]
fn test_unavailable_presence_never_counts() {
    let mut session = started(2700, 1);
    session.observe_presence(PresenceReading::Unavailable(PresenceError::FrameUnavailable));
    session.observe_presence(PresenceReading::Unavailable(PresenceError::ModelUnavailable));
    session.observe_presence(PresenceReading::Faces(1));
    assert_eq!(session.violation_count(), 0);
    assert_eq!(session.state(), SessionState::Active);
}

#[test]
fn test_manual_submit_just_before_expiry_wins() {
    let mut session = started(2, 3);
    session.tick();

    let submit = session.request_submit();
    assert_eq!(submit.reason, ReasonCode::R301_SUBMIT_STARTED);

    // The in-flight tick that would have expired the clock
    let late_tick = session.tick();
    assert_eq!(late_tick.reason, ReasonCode::R105_SESSION_NOT_ACTIVE);
    assert_eq!(session.record().unwrap().triggered_by, SubmissionTrigger::Manual);
    assert_eq!(session.time_remaining(), 1);
}

#[test]
fn test_snapshot_isolation() {
    let mut session = started(2700, 3);
    session.set_answer(1, OptionLabel::A);
    session.set_answer(2, OptionLabel::B);
    session.request_submit();
    let before = session.record().unwrap().clone();

    session.set_answer(1, OptionLabel::D);
    session.set_answer(4, OptionLabel::C);

    assert_eq!(session.record().unwrap(), &before);
    assert_eq!(before.answers.get(1), Some(OptionLabel::A));
    assert_eq!(before.answers.get(4), None);
}

#[test]
fn test_viewport_violations_debounced_until_restored() {
    let mut session = started(2700, 3);
    let mut host = RecordingViewport::new();

    assert_eq!(session.viewport_lost(&mut host).reason, ReasonCode::R205_VIEWPORT_LOST);
    assert_eq!(session.viewport_lost(&mut host).reason, ReasonCode::R206_VIEWPORT_REPEAT);
    assert_eq!(session.violation_count(), 1);

    session.viewport_restored();
    session.viewport_lost(&mut host);
    assert_eq!(session.violation_count(), 2);
    assert_eq!(
        session.violations().iter().filter(|v| v.kind == ViolationKind::ViewportLost).count(),
        2
    );
    // one request per counted loss
    assert_eq!(host.requests, 2);
}

#[tokio::test]
async fn test_single_transport_call_per_session() {
    let transport = InMemoryTransport::with_demo_paper("Asha", "R-1");
    let mut session = ExamSession::open(&transport, "Asha", "R-1", &config(2, 3)).await.unwrap();
    session.start(&mut RecordingViewport::new());

    session.request_submit();
    session.tick();
    session.tick();
    session.observe_presence(PresenceReading::Faces(0));
    session.request_submit();

    session.deliver(&transport).await;
    session.deliver(&transport).await;
    assert_eq!(transport.submit_calls(), 1);
    assert_eq!(session.state(), SessionState::Submitted);
}

#[tokio::test]
async fn test_retry_resends_same_record() {
    let transport = InMemoryTransport::with_demo_paper("Asha", "R-1");
    transport.fail_next_submit(TransportError::network("connection reset"));
    let mut session = ExamSession::open(&transport, "Asha", "R-1", &config(2700, 3)).await.unwrap();
    session.start(&mut RecordingViewport::new());
    session.set_answer(2, OptionLabel::B);
    session.request_submit();
    let digest = session.record().unwrap().digest();

    let failed = session.deliver(&transport).await;
    assert_eq!(failed.reason, ReasonCode::R304_SUBMIT_FAILED);
    assert_eq!(failed.state, SessionState::Failed);
    assert!(session.can_retry());

    // Further termination signals are still no-ops while failed
    assert_eq!(session.request_submit().reason, ReasonCode::R302_SIGNAL_DISCARDED);

    assert_eq!(session.retry().reason, ReasonCode::R306_RETRYING);
    let ok = session.deliver(&transport).await;
    assert_eq!(ok.reason, ReasonCode::R303_SUBMITTED);

    assert_eq!(transport.submit_calls(), 2);
    assert_eq!(session.record().unwrap().digest(), digest);
    let received = transport.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].answers.get(2), Some(OptionLabel::B));
}

#[tokio::test]
async fn test_rejected_submission_is_terminal() {
    let transport = InMemoryTransport::with_demo_paper("Asha", "R-1");
    transport.fail_next_submit(TransportError::Rejected("already submitted".to_string()));
    let mut session = ExamSession::open(&transport, "Asha", "R-1", &config(2700, 3)).await.unwrap();
    session.start(&mut RecordingViewport::new());
    session.request_submit();

    let out = session.deliver(&transport).await;
    assert_eq!(out.reason, ReasonCode::R305_SUBMIT_REJECTED);
    assert!(session.is_terminal());
    assert_eq!(session.retry().reason, ReasonCode::R307_RETRY_UNAVAILABLE);
    assert_eq!(transport.submit_calls(), 1);
}

#[tokio::test]
async fn test_already_completed_creates_no_session() {
    let transport = InMemoryTransport::with_demo_paper("Asha", "R-1");
    transport.mark_completed("R-1");

    let result = ExamSession::open(&transport, "Asha", "R-1", &config(2700, 3)).await;
    assert_eq!(result.unwrap_err(), StartError::AlreadyCompleted);
    assert_eq!(transport.submit_calls(), 0);
}

#[tokio::test]
async fn test_unknown_candidate_not_found() {
    let transport = InMemoryTransport::with_demo_paper("Asha", "R-1");
    let result = ExamSession::open(&transport, "Asha", "R-404", &config(2700, 3)).await;
    assert_eq!(result.unwrap_err(), StartError::NotFound("R-404".to_string()));
}
