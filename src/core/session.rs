//! Exam session aggregate
//!
//! One method per host event. Every method is total: it always returns a
//! `SessionOutput` describing the resulting state, and only the transport
//! (inside `deliver`) can fail.
//!
//! Signals arriving after the session has left ACTIVE (in-flight presence
//! results, late viewport events, a timer tick racing a manual submit) are
//! checked against the state before any ledger is touched and discarded.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::ExamConfig;
use crate::core::answers::AnswerLedger;
use crate::core::clock::{ClockTick, SessionClock};
use crate::core::coordinator::{DeliveryOutcome, GateDecision, RetryDecision, SubmissionCoordinator};
use crate::core::presence::{classify, PresenceReading};
use crate::core::transport::{ExamStart, ExamTransport};
use crate::core::violations::{RecordOutcome, ViolationLedger};
use crate::core::viewport::{ViewportGuard, ViewportHost, ViewportOutcome};
use crate::error::{StartError, TransportError};
use crate::types::{
    CandidateIdentity, OptionLabel, PaperIdentity, Question, QuestionId, ReasonCode,
    SessionOutput, SessionState, SessionSummary, SubmissionRecord, SubmissionTrigger, Violation,
    ViolationKind,
};

#[derive(Debug)]
pub struct ExamSession {
    candidate: CandidateIdentity,
    paper: PaperIdentity,
    /// Frozen order for the whole session
    questions: Vec<Question>,
    duration_secs: u64,
    clock: SessionClock,
    violations: ViolationLedger,
    answers: AnswerLedger,
    viewport: ViewportGuard,
    coordinator: SubmissionCoordinator,
    last_presence: Option<PresenceReading>,
}

impl ExamSession {
    /// Build a session from a resolved paper. Question order is shuffled
    /// once here (seeded when `config.shuffle_seed` is set).
    pub fn from_start(start: ExamStart, config: &ExamConfig) -> Result<Self, StartError> {
        start.validate()?;
        let candidate = start.candidate();
        let paper = start.paper();

        let mut questions: Vec<Question> = start
            .questions
            .into_iter()
            .map(|q| q.into_question())
            .collect();
        match config.shuffle_seed {
            Some(seed) => questions.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => questions.shuffle(&mut rand::thread_rng()),
        }

        let answers = AnswerLedger::new(questions.iter().map(|q| q.id));
        info!(
            roll_no = %candidate.roll_no,
            paper_id = paper.paper_id,
            set = %paper.set_name,
            questions = questions.len(),
            "exam session created"
        );

        Ok(Self {
            candidate,
            paper,
            questions,
            duration_secs: config.duration_secs,
            clock: SessionClock::new(),
            violations: ViolationLedger::new(config.max_violations),
            answers,
            viewport: ViewportGuard::new(),
            coordinator: SubmissionCoordinator::new(),
            last_presence: None,
        })
    }

    /// Resolve the paper through the transport and build the session.
    /// `AlreadyCompleted` (and every other start failure) means no session.
    pub async fn open<T>(
        transport: &T,
        candidate_name: &str,
        roll_no: &str,
        config: &ExamConfig,
    ) -> Result<Self, StartError>
    where
        T: ExamTransport + ?Sized,
    {
        let start = transport.start_exam(candidate_name, roll_no).await?;
        Self::from_start(start, config)
    }

    // =========================================================================
    // HOST EVENTS
    // =========================================================================

    /// AWAITING_START → ACTIVE: start the clock, open answers, enter fullscreen
    pub fn start(&mut self, host: &mut dyn ViewportHost) -> SessionOutput {
        if !self.coordinator.activate() {
            return self.output(ReasonCode::R105_SESSION_NOT_ACTIVE);
        }
        self.clock.start(self.duration_secs);
        self.answers.open();
        self.viewport.engage(host);
        info!(duration_secs = self.duration_secs, "exam started");
        self.output(ReasonCode::R102_SESSION_STARTED)
    }

    /// One clock period elapsed
    pub fn tick(&mut self) -> SessionOutput {
        if !self.state().is_active() {
            return self.output(ReasonCode::R105_SESSION_NOT_ACTIVE);
        }
        match self.clock.tick() {
            ClockTick::Ticked { remaining } => {
                debug!(remaining, "tick");
                self.output(ReasonCode::R103_CLOCK_TICK)
            }
            ClockTick::Expired => {
                info!("time expired");
                self.terminate(SubmissionTrigger::TimeExpired);
                self.output(ReasonCode::R104_TIME_EXPIRED)
            }
            ClockTick::Idle => self.output(ReasonCode::R105_SESSION_NOT_ACTIVE),
        }
    }

    /// Fold one presence cycle back into the session
    pub fn observe_presence(&mut self, reading: PresenceReading) -> SessionOutput {
        if !self.state().is_active() {
            debug!(?reading, "presence result discarded, session not active");
            return self.output(ReasonCode::R105_SESSION_NOT_ACTIVE);
        }
        self.last_presence = Some(reading);

        match reading {
            PresenceReading::Unavailable(e) => {
                debug!(error = %e, "presence cycle skipped");
                self.output(ReasonCode::R204_PRESENCE_SKIPPED)
            }
            PresenceReading::Faces(count) => match classify(count) {
                None => self.output(ReasonCode::R201_PRESENCE_OK),
                Some(violation) => self.record_violation(violation),
            },
        }
    }

    /// Host reports fullscreen / focus lost
    pub fn viewport_lost(&mut self, host: &mut dyn ViewportHost) -> SessionOutput {
        if !self.state().is_active() {
            return self.output(ReasonCode::R105_SESSION_NOT_ACTIVE);
        }
        match self.viewport.on_loss(host, &mut self.violations) {
            ViewportOutcome::Repeat => self.output(ReasonCode::R206_VIEWPORT_REPEAT),
            ViewportOutcome::Lost(outcome) => self.escalate(outcome, ViolationKind::ViewportLost),
        }
    }

    /// Host reports the guarded viewport back
    pub fn viewport_restored(&mut self) -> SessionOutput {
        self.viewport.on_restored();
        self.output(ReasonCode::R207_VIEWPORT_RESTORED)
    }

    /// Candidate picked an option. Ignored unless ACTIVE.
    pub fn set_answer(&mut self, id: QuestionId, option: OptionLabel) -> SessionOutput {
        if self.answers.set_answer(id, option) {
            self.output(ReasonCode::R106_ANSWER_RECORDED)
        } else {
            self.output(ReasonCode::R107_ANSWER_IGNORED)
        }
    }

    /// Candidate pressed submit
    pub fn request_submit(&mut self) -> SessionOutput {
        match self.terminate(SubmissionTrigger::Manual) {
            GateDecision::Accepted(_) => self.output(ReasonCode::R301_SUBMIT_STARTED),
            GateDecision::Discarded { .. } => self.output(ReasonCode::R302_SIGNAL_DISCARDED),
        }
    }

    /// Hand the pending record to the transport (one attempt)
    pub async fn deliver<T>(&mut self, transport: &T) -> SessionOutput
    where
        T: ExamTransport + ?Sized,
    {
        match self.coordinator.deliver(transport).await {
            DeliveryOutcome::Submitted => self.output(ReasonCode::R303_SUBMITTED),
            DeliveryOutcome::Failed { retryable: true, .. } => {
                self.output(ReasonCode::R304_SUBMIT_FAILED)
            }
            DeliveryOutcome::Failed { retryable: false, .. } => {
                self.output(ReasonCode::R305_SUBMIT_REJECTED)
            }
            DeliveryOutcome::NothingPending => self.output(ReasonCode::R105_SESSION_NOT_ACTIVE),
        }
    }

    /// FAILED → SUBMITTING with the same record
    pub fn retry(&mut self) -> SessionOutput {
        match self.coordinator.retry() {
            RetryDecision::Resumed => self.output(ReasonCode::R306_RETRYING),
            RetryDecision::Unavailable => self.output(ReasonCode::R307_RETRY_UNAVAILABLE),
        }
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn record_violation(&mut self, violation: Violation) -> SessionOutput {
        let kind = violation.kind;
        let outcome = self.violations.record(violation);
        self.escalate(outcome, kind)
    }

    fn escalate(&mut self, outcome: RecordOutcome, kind: ViolationKind) -> SessionOutput {
        match outcome {
            RecordOutcome::Recorded { .. } => self.output(match kind {
                ViolationKind::FaceMissing => ReasonCode::R202_FACE_MISSING,
                ViolationKind::MultipleFaces => ReasonCode::R203_MULTIPLE_FACES,
                ViolationKind::ViewportLost => ReasonCode::R205_VIEWPORT_LOST,
            }),
            RecordOutcome::ThresholdReached { .. } => {
                self.terminate(SubmissionTrigger::ViolationThreshold);
                self.output(ReasonCode::R208_THRESHOLD_REACHED)
            }
            RecordOutcome::AlreadyEscalated { .. } => {
                self.output(ReasonCode::R209_ALREADY_ESCALATED)
            }
        }
    }

    /// Offer a termination signal to the gate. The winner snapshots the
    /// answers; the clock stops and the answer ledger seals.
    fn terminate(&mut self, trigger: SubmissionTrigger) -> GateDecision {
        let candidate = &self.candidate;
        let paper = &self.paper;
        let answers = &self.answers;

        let decision = self.coordinator.request(trigger, |t| {
            SubmissionRecord::new(candidate.clone(), paper.clone(), answers.snapshot(), t)
        });

        if let GateDecision::Accepted(_) = decision {
            self.clock.stop();
            self.answers.seal();
        }
        decision
    }

    fn output(&self, reason: ReasonCode) -> SessionOutput {
        SessionOutput {
            timestamp: chrono::Utc::now(),
            state: self.state(),
            time_remaining: self.time_remaining(),
            violation_count: self.violations.count(),
            max_violations: self.violations.max(),
            attempted: self.answers.attempted_count(),
            reason,
            triggered_by: self.coordinator.triggered_by(),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current status without changing anything
    pub fn status(&self) -> SessionOutput {
        let reason = match self.state() {
            SessionState::AwaitingStart => ReasonCode::R101_AWAITING_START,
            SessionState::Active => ReasonCode::R103_CLOCK_TICK,
            SessionState::Submitting => ReasonCode::R301_SUBMIT_STARTED,
            SessionState::Submitted => ReasonCode::R303_SUBMITTED,
            SessionState::Failed if self.coordinator.can_retry() => ReasonCode::R304_SUBMIT_FAILED,
            SessionState::Failed => ReasonCode::R305_SUBMIT_REJECTED,
        };
        self.output(reason)
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            candidate_name: self.candidate.name.clone(),
            roll_no: self.candidate.roll_no.clone(),
            state: self.state(),
            attempted: self.answers.attempted_count(),
            unattempted: self.answers.unattempted_count(),
            violation_count: self.violations.count(),
            triggered_by: self.coordinator.triggered_by(),
            submit_attempts: self.coordinator.attempts(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.coordinator.state()
    }

    /// Waiting for a transport attempt
    pub fn pending_delivery(&self) -> bool {
        self.state() == SessionState::Submitting
    }

    pub fn can_retry(&self) -> bool {
        self.coordinator.can_retry()
    }

    pub fn is_terminal(&self) -> bool {
        self.coordinator.is_terminal()
    }

    pub fn time_remaining(&self) -> u64 {
        match self.state() {
            SessionState::AwaitingStart => self.duration_secs,
            _ => self.clock.remaining(),
        }
    }

    pub fn violation_count(&self) -> u32 {
        self.violations.count()
    }

    pub fn violations(&self) -> &[Violation] {
        self.violations.entries()
    }

    pub fn recent_violations(&self, n: usize) -> &[Violation] {
        self.violations.recent(n)
    }

    pub fn candidate(&self) -> &CandidateIdentity {
        &self.candidate
    }

    pub fn paper(&self) -> &PaperIdentity {
        &self.paper
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answer(&self, id: QuestionId) -> Option<OptionLabel> {
        self.answers.answer(id)
    }

    pub fn record(&self) -> Option<&SubmissionRecord> {
        self.coordinator.record()
    }

    pub fn submit_attempts(&self) -> u32 {
        self.coordinator.attempts()
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.coordinator.last_error()
    }

    pub fn last_presence(&self) -> Option<PresenceReading> {
        self.last_presence
    }

    pub fn viewport(&self) -> &ViewportGuard {
        &self.viewport
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::{demo_paper, InMemoryTransport};
    use crate::core::viewport::RecordingViewport;
    use crate::error::PresenceError;

    fn config(duration_secs: u64) -> ExamConfig {
        ExamConfig {
            duration_secs,
            shuffle_seed: Some(42),
            ..ExamConfig::default()
        }
    }

    fn started(duration_secs: u64) -> ExamSession {
        let mut session = ExamSession::from_start(demo_paper("Asha", "R-1"), &config(duration_secs)).unwrap();
        session.start(&mut RecordingViewport::new());
        session
    }

    #[test]
    fn test_awaiting_start_ignores_events() {
        let mut session = ExamSession::from_start(demo_paper("Asha", "R-1"), &config(10)).unwrap();
        assert_eq!(session.state(), SessionState::AwaitingStart);
        assert_eq!(session.tick().reason, ReasonCode::R105_SESSION_NOT_ACTIVE);
        assert_eq!(session.set_answer(1, OptionLabel::A).reason, ReasonCode::R107_ANSWER_IGNORED);
        assert_eq!(
            session.observe_presence(PresenceReading::Faces(0)).reason,
            ReasonCode::R105_SESSION_NOT_ACTIVE
        );
        assert_eq!(session.time_remaining(), 10);
        assert_eq!(session.violation_count(), 0);
    }

    #[test]
    fn test_start_twice() {
        let mut session = started(10);
        let again = session.start(&mut RecordingViewport::new());
        assert_eq!(again.reason, ReasonCode::R105_SESSION_NOT_ACTIVE);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_seeded_order_is_stable() {
        let a = ExamSession::from_start(demo_paper("Asha", "R-1"), &config(10)).unwrap();
        let b = ExamSession::from_start(demo_paper("Asha", "R-1"), &config(10)).unwrap();
        let ids = |s: &ExamSession| s.questions().iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(ids(&a), ids(&b));
        assert_eq!(a.questions().len(), 5);
    }

    #[test]
    fn test_time_expiry_submits() {
        let mut session = started(2);
        session.set_answer(2, OptionLabel::B);
        session.tick();
        let out = session.tick();
        assert_eq!(out.reason, ReasonCode::R104_TIME_EXPIRED);
        assert_eq!(out.state, SessionState::Submitting);
        assert_eq!(out.triggered_by, Some(SubmissionTrigger::TimeExpired));
        assert_eq!(session.record().unwrap().answers.get(2), Some(OptionLabel::B));
    }

    #[test]
    fn test_presence_unavailable_never_violates() {
        let mut session = started(10);
        for _ in 0..10 {
            let out = session.observe_presence(PresenceReading::Unavailable(PresenceError::ModelUnavailable));
            assert_eq!(out.reason, ReasonCode::R204_PRESENCE_SKIPPED);
        }
        assert_eq!(session.violation_count(), 0);
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn test_mixed_violations_escalate() {
        let mut session = started(100);
        let mut host = RecordingViewport::new();
        session.observe_presence(PresenceReading::Faces(0));
        session.viewport_lost(&mut host);
        let out = session.observe_presence(PresenceReading::Faces(3));
        assert_eq!(out.reason, ReasonCode::R208_THRESHOLD_REACHED);
        assert_eq!(out.triggered_by, Some(SubmissionTrigger::ViolationThreshold));
    }

    #[test]
    fn test_answers_sealed_after_gate() {
        let mut session = started(100);
        session.set_answer(1, OptionLabel::A);
        session.request_submit();
        assert_eq!(session.set_answer(1, OptionLabel::D).reason, ReasonCode::R107_ANSWER_IGNORED);
        assert_eq!(session.answer(1), Some(OptionLabel::A));
        assert_eq!(session.record().unwrap().answers.get(1), Some(OptionLabel::A));
    }

    #[test]
    fn test_clock_frozen_after_gate() {
        let mut session = started(100);
        session.tick();
        session.request_submit();
        for _ in 0..5 {
            session.tick();
        }
        assert_eq!(session.time_remaining(), 99);
    }

    #[tokio::test]
    async fn test_open_already_completed() {
        let transport = InMemoryTransport::with_demo_paper("Asha", "R-1");
        transport.mark_completed("R-1");
        let result = ExamSession::open(&transport, "Asha", "R-1", &config(10)).await;
        assert_eq!(result.unwrap_err(), StartError::AlreadyCompleted);
    }

    #[tokio::test]
    async fn test_summary_after_submit() {
        let transport = InMemoryTransport::with_demo_paper("Asha", "R-1");
        let mut session = ExamSession::open(&transport, "Asha", "R-1", &config(10)).await.unwrap();
        session.start(&mut RecordingViewport::new());
        session.set_answer(1, OptionLabel::B);
        session.set_answer(4, OptionLabel::B);
        session.request_submit();
        let out = session.deliver(&transport).await;
        assert_eq!(out.reason, ReasonCode::R303_SUBMITTED);

        let summary = session.summary();
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.unattempted, 3);
        assert_eq!(summary.triggered_by, Some(SubmissionTrigger::Manual));
        assert_eq!(summary.submit_attempts, 1);
    }
}
