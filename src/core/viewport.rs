//! Viewport guard: turns fullscreen / focus loss into violations
//!
//! One violation per discrete loss. After a loss the guard is breached and
//! repeat notifications are ignored until the host reports the viewport
//! restored. Every counted loss also re-requests fullscreen; a refused
//! request is logged and retried on the next loss.

use tracing::{debug, warn};

use crate::core::violations::{RecordOutcome, ViolationLedger};
use crate::error::ViewportError;
use crate::types::Violation;

/// Host primitives for the guarded viewport
pub trait ViewportHost {
    /// Ask the host to (re-)enter fullscreen
    fn request_fullscreen(&mut self) -> Result<(), ViewportError>;
}

/// Result of a loss notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportOutcome {
    /// New loss; violation handed to the ledger
    Lost(RecordOutcome),
    /// Already breached, notification debounced
    Repeat,
}

#[derive(Debug, Clone, Default)]
pub struct ViewportGuard {
    breached: bool,
    losses: u32,
    reacquire_failures: u32,
}

impl ViewportGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the guarded state at session start
    pub fn engage(&mut self, host: &mut dyn ViewportHost) {
        self.reacquire(host);
    }

    /// Host reported the guarded context lost
    pub fn on_loss(
        &mut self,
        host: &mut dyn ViewportHost,
        ledger: &mut ViolationLedger,
    ) -> ViewportOutcome {
        if self.breached {
            debug!("viewport loss repeat ignored");
            return ViewportOutcome::Repeat;
        }

        self.breached = true;
        self.losses += 1;
        let outcome = ledger.record(Violation::viewport_lost());
        self.reacquire(host);
        ViewportOutcome::Lost(outcome)
    }

    /// Host reported the guarded context back; re-arms loss detection
    pub fn on_restored(&mut self) -> bool {
        let was_breached = self.breached;
        self.breached = false;
        was_breached
    }

    fn reacquire(&mut self, host: &mut dyn ViewportHost) {
        if let Err(e) = host.request_fullscreen() {
            self.reacquire_failures += 1;
            warn!(error = %e, "fullscreen request failed");
        }
    }

    pub fn is_breached(&self) -> bool {
        self.breached
    }

    pub fn losses(&self) -> u32 {
        self.losses
    }

    pub fn reacquire_failures(&self) -> u32 {
        self.reacquire_failures
    }
}

/// Viewport host double: counts requests, optionally refuses them
#[derive(Debug, Clone, Default)]
pub struct RecordingViewport {
    pub requests: u32,
    /// Refuse every request while set
    pub deny: bool,
}

impl RecordingViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying() -> Self {
        Self { requests: 0, deny: true }
    }
}

impl ViewportHost for RecordingViewport {
    fn request_fullscreen(&mut self) -> Result<(), ViewportError> {
        self.requests += 1;
        if self.deny {
            Err(ViewportError::RequestDenied("not allowed by host".to_string()))
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engage_requests_fullscreen() {
        let mut guard = ViewportGuard::new();
        let mut host = RecordingViewport::new();
        guard.engage(&mut host);
        assert_eq!(host.requests, 1);
        assert!(!guard.is_breached());
    }

    #[test]
    fn test_loss_records_one_violation() {
        let mut guard = ViewportGuard::new();
        let mut host = RecordingViewport::new();
        let mut ledger = ViolationLedger::new(3);

        let outcome = guard.on_loss(&mut host, &mut ledger);
        assert_eq!(outcome, ViewportOutcome::Lost(RecordOutcome::Recorded { count: 1 }));
        assert_eq!(host.requests, 1);
    }

    #[test]
    fn test_repeat_loss_debounced() {
        let mut guard = ViewportGuard::new();
        let mut host = RecordingViewport::new();
        let mut ledger = ViolationLedger::new(3);

        guard.on_loss(&mut host, &mut ledger);
        assert_eq!(guard.on_loss(&mut host, &mut ledger), ViewportOutcome::Repeat);
        assert_eq!(guard.on_loss(&mut host, &mut ledger), ViewportOutcome::Repeat);
        assert_eq!(ledger.count(), 1);
        assert_eq!(guard.losses(), 1);
    }

    #[test]
    fn test_restore_rearms() {
        let mut guard = ViewportGuard::new();
        let mut host = RecordingViewport::new();
        let mut ledger = ViolationLedger::new(3);

        guard.on_loss(&mut host, &mut ledger);
        assert!(guard.on_restored());
        assert!(!guard.on_restored());
        guard.on_loss(&mut host, &mut ledger);
        assert_eq!(ledger.count(), 2);
    }

    #[test]
    fn test_denied_request_is_not_fatal() {
        let mut guard = ViewportGuard::new();
        let mut host = RecordingViewport::denying();
        let mut ledger = ViolationLedger::new(3);

        guard.engage(&mut host);
        let outcome = guard.on_loss(&mut host, &mut ledger);
        assert!(matches!(outcome, ViewportOutcome::Lost(_)));
        assert_eq!(guard.reacquire_failures(), 2);
        assert_eq!(ledger.count(), 1);
    }
}
