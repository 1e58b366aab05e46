//! Session clock: countdown from a fixed duration to zero
//!
//! Phases:
//! - IDLE → RUNNING: `start(duration)`
//! - RUNNING → EXPIRED: the tick that reaches zero (emits `Expired` once)
//! - RUNNING → STOPPED: `stop()` (idempotent, never emits `Expired`)

use serde::{Deserialize, Serialize};

/// Where the clock is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockPhase {
    Idle,
    Running,
    Stopped,
    Expired,
}

/// Result of one `tick()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// One second consumed, time still left
    Ticked { remaining: u64 },
    /// Countdown reached zero on this tick
    Expired,
    /// Clock not running; tick ignored
    Idle,
}

/// Countdown owned by one exam session
#[derive(Debug, Clone)]
pub struct SessionClock {
    phase: ClockPhase,
    /// Configured duration (seconds)
    duration: u64,
    /// Seconds left
    remaining: u64,
    /// Ticks actually applied
    applied_ticks: u64,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    /// Create an idle clock
    pub fn new() -> Self {
        Self {
            phase: ClockPhase::Idle,
            duration: 0,
            remaining: 0,
            applied_ticks: 0,
        }
    }

    /// Begin counting down. Only an idle clock can be started.
    pub fn start(&mut self, duration_secs: u64) -> bool {
        if self.phase != ClockPhase::Idle {
            return false;
        }
        self.phase = ClockPhase::Running;
        self.duration = duration_secs;
        self.remaining = duration_secs;
        true
    }

    /// Apply one second. No-op unless running.
    pub fn tick(&mut self) -> ClockTick {
        if self.phase != ClockPhase::Running {
            return ClockTick::Idle;
        }

        self.remaining = self.remaining.saturating_sub(1);
        self.applied_ticks += 1;

        if self.remaining == 0 {
            self.phase = ClockPhase::Expired;
            ClockTick::Expired
        } else {
            ClockTick::Ticked { remaining: self.remaining }
        }
    }

    /// Halt the countdown. Safe to call in any phase.
    pub fn stop(&mut self) {
        if self.phase == ClockPhase::Running {
            self.phase = ClockPhase::Stopped;
        }
    }

    pub fn phase(&self) -> ClockPhase {
        self.phase
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn applied_ticks(&self) -> u64 {
        self.applied_ticks
    }

    pub fn is_running(&self) -> bool {
        self.phase == ClockPhase::Running
    }
}

/// Render seconds as `MM:SS` (minutes keep counting past 59)
pub fn format_remaining(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_clock_ignores_ticks() {
        let mut clock = SessionClock::new();
        assert_eq!(clock.tick(), ClockTick::Idle);
        assert_eq!(clock.remaining(), 0);
        assert_eq!(clock.applied_ticks(), 0);
    }

    #[test]
    fn test_two_second_countdown() {
        let mut clock = SessionClock::new();
        assert!(clock.start(2));
        assert_eq!(clock.tick(), ClockTick::Ticked { remaining: 1 });
        assert_eq!(clock.tick(), ClockTick::Expired);
        assert_eq!(clock.phase(), ClockPhase::Expired);
    }

    #[test]
    fn test_expired_fires_once_and_floors_at_zero() {
        let mut clock = SessionClock::new();
        clock.start(1);
        assert_eq!(clock.tick(), ClockTick::Expired);

        for _ in 0..100 {
            assert_eq!(clock.tick(), ClockTick::Idle);
        }
        assert_eq!(clock.remaining(), 0);
        assert_eq!(clock.applied_ticks(), 1);
    }

    #[test]
    fn test_zero_duration_expires_on_first_tick() {
        let mut clock = SessionClock::new();
        clock.start(0);
        assert_eq!(clock.tick(), ClockTick::Expired);
        assert_eq!(clock.tick(), ClockTick::Idle);
    }

    #[test]
    fn test_stop_is_idempotent_and_suppresses_expiry() {
        let mut clock = SessionClock::new();
        clock.start(3);
        clock.tick();
        clock.stop();
        clock.stop();
        assert_eq!(clock.phase(), ClockPhase::Stopped);
        assert_eq!(clock.tick(), ClockTick::Idle);
        assert_eq!(clock.tick(), ClockTick::Idle);
        assert_eq!(clock.remaining(), 2);
    }

    #[test]
    fn test_stop_after_expiry_keeps_expired() {
        let mut clock = SessionClock::new();
        clock.start(1);
        clock.tick();
        clock.stop();
        assert_eq!(clock.phase(), ClockPhase::Expired);
    }

    #[test]
    fn test_restart_rejected() {
        let mut clock = SessionClock::new();
        assert!(clock.start(10));
        assert!(!clock.start(99));
        assert_eq!(clock.duration(), 10);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(2700), "45:00");
        assert_eq!(format_remaining(61), "01:01");
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(6000), "100:00");
    }
}
