//! Reason codes for session events and state changes

use serde::{Deserialize, Serialize};

/// Reason codes attached to every `SessionOutput`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R1xx: Session lifecycle and clock
    // =========================================================================
    /// Paper loaded, waiting for start
    R101_AWAITING_START,
    /// Session started, clock running
    R102_SESSION_STARTED,
    /// One second elapsed
    R103_CLOCK_TICK,
    /// Countdown reached zero
    R104_TIME_EXPIRED,
    /// Event arrived while the session was not active
    R105_SESSION_NOT_ACTIVE,
    /// Answer stored
    R106_ANSWER_RECORDED,
    /// Answer ignored (unknown question or ledger sealed)
    R107_ANSWER_IGNORED,

    // =========================================================================
    // R2xx: Proctoring signals
    // =========================================================================
    /// Exactly one face visible
    R201_PRESENCE_OK,
    /// No face visible
    R202_FACE_MISSING,
    /// More than one face visible
    R203_MULTIPLE_FACES,
    /// Camera or model not ready, cycle skipped
    R204_PRESENCE_SKIPPED,
    /// Fullscreen / focus lost
    R205_VIEWPORT_LOST,
    /// Repeat loss notification, debounced
    R206_VIEWPORT_REPEAT,
    /// Guarded viewport restored
    R207_VIEWPORT_RESTORED,
    /// Violation maximum reached
    R208_THRESHOLD_REACHED,
    /// Ledger already escalated, violation not appended
    R209_ALREADY_ESCALATED,

    // =========================================================================
    // R3xx: Submission
    // =========================================================================
    /// Gate acquired, record built
    R301_SUBMIT_STARTED,
    /// Gate already closed, signal discarded
    R302_SIGNAL_DISCARDED,
    /// Transport accepted the record
    R303_SUBMITTED,
    /// Transport failed, retry available
    R304_SUBMIT_FAILED,
    /// Transport rejected the record, no retry
    R305_SUBMIT_REJECTED,
    /// Retrying with the same record
    R306_RETRYING,
    /// Retry not possible in the current state
    R307_RETRY_UNAVAILABLE,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R101_AWAITING_START => "R101_AWAITING_START",
            Self::R102_SESSION_STARTED => "R102_SESSION_STARTED",
            Self::R103_CLOCK_TICK => "R103_CLOCK_TICK",
            Self::R104_TIME_EXPIRED => "R104_TIME_EXPIRED",
            Self::R105_SESSION_NOT_ACTIVE => "R105_SESSION_NOT_ACTIVE",
            Self::R106_ANSWER_RECORDED => "R106_ANSWER_RECORDED",
            Self::R107_ANSWER_IGNORED => "R107_ANSWER_IGNORED",
            Self::R201_PRESENCE_OK => "R201_PRESENCE_OK",
            Self::R202_FACE_MISSING => "R202_FACE_MISSING",
            Self::R203_MULTIPLE_FACES => "R203_MULTIPLE_FACES",
            Self::R204_PRESENCE_SKIPPED => "R204_PRESENCE_SKIPPED",
            Self::R205_VIEWPORT_LOST => "R205_VIEWPORT_LOST",
            Self::R206_VIEWPORT_REPEAT => "R206_VIEWPORT_REPEAT",
            Self::R207_VIEWPORT_RESTORED => "R207_VIEWPORT_RESTORED",
            Self::R208_THRESHOLD_REACHED => "R208_THRESHOLD_REACHED",
            Self::R209_ALREADY_ESCALATED => "R209_ALREADY_ESCALATED",
            Self::R301_SUBMIT_STARTED => "R301_SUBMIT_STARTED",
            Self::R302_SIGNAL_DISCARDED => "R302_SIGNAL_DISCARDED",
            Self::R303_SUBMITTED => "R303_SUBMITTED",
            Self::R304_SUBMIT_FAILED => "R304_SUBMIT_FAILED",
            Self::R305_SUBMIT_REJECTED => "R305_SUBMIT_REJECTED",
            Self::R306_RETRYING => "R306_RETRYING",
            Self::R307_RETRY_UNAVAILABLE => "R307_RETRY_UNAVAILABLE",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R101_AWAITING_START => "Waiting for exam start",
            Self::R102_SESSION_STARTED => "Exam started",
            Self::R103_CLOCK_TICK => "Clock running",
            Self::R104_TIME_EXPIRED => "Time's up",
            Self::R105_SESSION_NOT_ACTIVE => "Session not active",
            Self::R106_ANSWER_RECORDED => "Answer saved",
            Self::R107_ANSWER_IGNORED => "Answer ignored",
            Self::R201_PRESENCE_OK => "Candidate visible",
            Self::R202_FACE_MISSING => "Face not visible",
            Self::R203_MULTIPLE_FACES => "Multiple faces detected",
            Self::R204_PRESENCE_SKIPPED => "Presence check skipped",
            Self::R205_VIEWPORT_LOST => "Exited fullscreen",
            Self::R206_VIEWPORT_REPEAT => "Repeat viewport loss ignored",
            Self::R207_VIEWPORT_RESTORED => "Fullscreen restored",
            Self::R208_THRESHOLD_REACHED => "Too many violations",
            Self::R209_ALREADY_ESCALATED => "Violation limit already reached",
            Self::R301_SUBMIT_STARTED => "Submitting answers",
            Self::R302_SIGNAL_DISCARDED => "Submission already in progress",
            Self::R303_SUBMITTED => "Exam submitted",
            Self::R304_SUBMIT_FAILED => "Submission failed, retry available",
            Self::R305_SUBMIT_REJECTED => "Submission rejected",
            Self::R306_RETRYING => "Retrying submission",
            Self::R307_RETRY_UNAVAILABLE => "Retry not available",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
