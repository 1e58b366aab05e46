//! Exam session state definitions

use serde::{Deserialize, Serialize};

/// Lifecycle of one exam session
///
/// `AwaitingStart → Active → Submitting → {Submitted | Failed}`, with
/// `Failed → Submitting` as the only re-entrant edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Paper resolved, clock not yet running
    AwaitingStart,
    /// Candidate is answering; clock and proctoring live
    Active,
    /// Gate closed, record handed to the transport
    Submitting,
    /// Transport accepted the record (terminal)
    Submitted,
    /// Transport attempt failed; may be retried
    Failed,
}

impl SessionState {
    /// True while the candidate may still interact with the paper
    pub fn is_active(&self) -> bool {
        *self == SessionState::Active
    }

    /// True once the gate has closed, whatever the transport outcome
    pub fn has_left_active(&self) -> bool {
        matches!(
            self,
            SessionState::Submitting | SessionState::Submitted | SessionState::Failed
        )
    }

    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            SessionState::AwaitingStart => "\x1b[90m", // Gray
            SessionState::Active => "\x1b[34m",        // Blue
            SessionState::Submitting => "\x1b[33m",    // Yellow
            SessionState::Submitted => "\x1b[32m",     // Green
            SessionState::Failed => "\x1b[31m",        // Red
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            SessionState::AwaitingStart => "⏳",
            SessionState::Active => "📝",
            SessionState::Submitting => "📤",
            SessionState::Submitted => "✅",
            SessionState::Failed => "⚠",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::AwaitingStart => "AWAITING_START",
            SessionState::Active => "ACTIVE",
            SessionState::Submitting => "SUBMITTING",
            SessionState::Submitted => "SUBMITTED",
            SessionState::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}
