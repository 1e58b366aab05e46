//! Submission coordinator: the single-acquisition gate and the
//! Submitting / Submitted / Failed state machine.
//!
//! State transitions:
//! - AWAITING_START → ACTIVE: `activate()`
//! - ACTIVE → SUBMITTING: first of TimeExpired / ViolationThreshold / Manual
//! - SUBMITTING → SUBMITTED: transport success
//! - SUBMITTING → FAILED: transport failure
//! - FAILED → SUBMITTING: `retry()` (retryable failures only, same record)

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::core::transport::ExamTransport;
use crate::error::TransportError;
use crate::types::{SessionState, SubmissionRecord, SubmissionTrigger};

/// Compare-and-set gate: exactly one `try_acquire` ever succeeds
#[derive(Debug, Default)]
pub struct SubmissionGate {
    closed: AtomicBool,
}

impl SubmissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate. True only for the caller that closed it.
    pub fn try_acquire(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Outcome of a termination signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// This signal won; record built, state is `Submitting`
    Accepted(SubmissionTrigger),
    /// Gate was closed or the session was not active; nothing changed
    Discarded {
        trigger: SubmissionTrigger,
        state: SessionState,
    },
}

/// Outcome of one transport attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Submitted,
    Failed { error: TransportError, retryable: bool },
    /// No record pending (not in `Submitting`)
    NothingPending,
}

/// Outcome of `retry()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back in `Submitting` with the original record
    Resumed,
    /// Not in `Failed`, or the failure was not retryable
    Unavailable,
}

#[derive(Debug)]
pub struct SubmissionCoordinator {
    state: SessionState,
    gate: SubmissionGate,
    record: Option<SubmissionRecord>,
    attempts: u32,
    last_error: Option<TransportError>,
}

impl Default for SubmissionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionCoordinator {
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingStart,
            gate: SubmissionGate::new(),
            record: None,
            attempts: 0,
            last_error: None,
        }
    }

    /// AWAITING_START → ACTIVE
    pub fn activate(&mut self) -> bool {
        if self.state != SessionState::AwaitingStart {
            return false;
        }
        self.state = SessionState::Active;
        info!("session active");
        true
    }

    /// Offer a termination signal. The record is built (and the answers
    /// snapshotted) only if this signal wins the gate.
    pub fn request<F>(&mut self, trigger: SubmissionTrigger, build: F) -> GateDecision
    where
        F: FnOnce(SubmissionTrigger) -> SubmissionRecord,
    {
        if self.state != SessionState::Active || !self.gate.try_acquire() {
            info!(%trigger, state = %self.state, "termination signal discarded");
            return GateDecision::Discarded {
                trigger,
                state: self.state,
            };
        }

        let record = build(trigger);
        info!(%trigger, answers = record.answers.len(), digest = %record.digest(), "submission started");
        self.record = Some(record);
        self.state = SessionState::Submitting;
        GateDecision::Accepted(trigger)
    }

    /// Hand the pending record to the transport once
    pub async fn deliver<T>(&mut self, transport: &T) -> DeliveryOutcome
    where
        T: ExamTransport + ?Sized,
    {
        if self.state != SessionState::Submitting {
            return DeliveryOutcome::NothingPending;
        }
        let Some(record) = self.record.as_ref() else {
            return DeliveryOutcome::NothingPending;
        };

        self.attempts += 1;
        match transport.submit_exam(&record.candidate.roll_no, &record.answers).await {
            Ok(()) => {
                self.state = SessionState::Submitted;
                self.last_error = None;
                info!(attempts = self.attempts, "submission accepted");
                DeliveryOutcome::Submitted
            }
            Err(e) => {
                let retryable = e.is_retryable();
                self.state = SessionState::Failed;
                if retryable {
                    warn!(attempts = self.attempts, error = %e, "submission failed, retry available");
                } else {
                    error!(attempts = self.attempts, error = %e, "submission rejected");
                }
                self.last_error = Some(e.clone());
                DeliveryOutcome::Failed { error: e, retryable }
            }
        }
    }

    /// FAILED → SUBMITTING with the record built at gate time
    pub fn retry(&mut self) -> RetryDecision {
        if !self.can_retry() {
            return RetryDecision::Unavailable;
        }
        self.state = SessionState::Submitting;
        info!(attempt = self.attempts + 1, "retrying submission");
        RetryDecision::Resumed
    }

    pub fn can_retry(&self) -> bool {
        self.state == SessionState::Failed
            && self
                .last_error
                .as_ref()
                .map(TransportError::is_retryable)
                .unwrap_or(false)
    }

    /// Submitted, or failed with no retry possible
    pub fn is_terminal(&self) -> bool {
        self.state == SessionState::Submitted
            || (self.state == SessionState::Failed && !self.can_retry())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn record(&self) -> Option<&SubmissionRecord> {
        self.record.as_ref()
    }

    pub fn triggered_by(&self) -> Option<SubmissionTrigger> {
        self.record.as_ref().map(|r| r.triggered_by)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }
}

// =============================================================================
// TESTS
// =============================================================================
