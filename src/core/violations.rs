//! Violation ledger: append-only log with a one-shot escalation threshold
//!
//! `record` appends and checks the threshold in one `&mut self` step, so the
//! ledger is the single serialization point for presence and viewport
//! signals. Exactly one call ever returns `ThresholdReached`.

use tracing::warn;

use crate::types::Violation;
use crate::MAX_VIOLATIONS;

/// Result of one `record` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Appended, still below the maximum
    Recorded { count: u32 },
    /// Appended and the maximum was reached by this call
    ThresholdReached { count: u32 },
    /// Maximum was reached earlier; nothing appended
    AlreadyEscalated { count: u32 },
}

impl RecordOutcome {
    pub fn count(&self) -> u32 {
        match *self {
            RecordOutcome::Recorded { count }
            | RecordOutcome::ThresholdReached { count }
            | RecordOutcome::AlreadyEscalated { count } => count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViolationLedger {
    entries: Vec<Violation>,
    max: u32,
    escalated: bool,
}

impl Default for ViolationLedger {
    fn default() -> Self {
        Self::new(MAX_VIOLATIONS)
    }
}

impl ViolationLedger {
    /// Create a ledger escalating at `max` violations (clamped to at least 1)
    pub fn new(max: u32) -> Self {
        Self {
            entries: Vec::new(),
            max: max.max(1),
            escalated: false,
        }
    }

    /// Append a violation unless already escalated
    pub fn record(&mut self, violation: Violation) -> RecordOutcome {
        if self.escalated {
            return RecordOutcome::AlreadyEscalated { count: self.count() };
        }

        warn!(kind = %violation.kind, detail = %violation.detail, "violation recorded");
        self.entries.push(violation);
        let count = self.count();

        if count >= self.max {
            self.escalated = true;
            warn!(count, max = self.max, "violation threshold reached");
            RecordOutcome::ThresholdReached { count }
        } else {
            RecordOutcome::Recorded { count }
        }
    }

    /// Always equals the number of stored entries
    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_escalated(&self) -> bool {
        self.escalated
    }

    pub fn entries(&self) -> &[Violation] {
        &self.entries
    }

    /// Last `n` violations, oldest first
    pub fn recent(&self, n: usize) -> &[Violation] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }
}

// =============================================================================
// TESTS
// =============================================================================
