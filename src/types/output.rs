//! Output structures for terminal display and live updates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::clock::format_remaining;
use crate::types::{ReasonCode, SessionState, SubmissionTrigger};

/// Output structure for each session event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutput {
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Current state
    pub state: SessionState,
    /// Seconds left on the clock
    pub time_remaining: u64,
    /// Violations recorded so far
    pub violation_count: u32,
    /// Configured violation maximum
    pub max_violations: u32,
    /// Questions with an answer
    pub attempted: usize,
    /// Reason for this output
    pub reason: ReasonCode,
    /// Set once the gate has closed
    pub triggered_by: Option<SubmissionTrigger>,
}

impl SessionOutput {
    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.state.color_code();
        let reset = SessionState::color_reset();
        let emoji = self.state.emoji();

        format!(
            "{}{} ⏱ {} | state={} | violations={}/{} | answered={} | {}{}",
            color,
            emoji,
            format_remaining(self.time_remaining),
            self.state,
            self.violation_count,
            self.max_violations,
            self.attempted,
            self.reason.code(),
            reset
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "time={} | state={} | violations={}/{} | answered={} | reason={}",
            format_remaining(self.time_remaining),
            self.state,
            self.violation_count,
            self.max_violations,
            self.attempted,
            self.reason.code()
        )
    }
}

/// Post-submission summary shown to the candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub candidate_name: String,
    pub roll_no: String,
    pub state: SessionState,
    pub attempted: usize,
    pub unattempted: usize,
    pub violation_count: u32,
    pub triggered_by: Option<SubmissionTrigger>,
    pub submit_attempts: u32,
}
