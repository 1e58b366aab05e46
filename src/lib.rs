//! Examguard: proctored exam session controller
//!
//! Owns session time, tracks integrity violations and guarantees that an
//! exam session ends in exactly one submission, whichever signal ends it:
//! clock expiry, violation escalation or a manual submit.

pub mod config;
pub mod core;
pub mod error;
pub mod types;

// =============================================================================
// SESSION LIMITS
// =============================================================================

/// Exam duration (seconds) - 45 minutes
pub const EXAM_DURATION_SECS: u64 = 45 * 60;

/// Violations allowed before the session is force-submitted
pub const MAX_VIOLATIONS: u32 = 3;

// =============================================================================
// HOST CADENCE
// =============================================================================

/// Clock tick period (milliseconds)
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Presence poll period (milliseconds)
pub const PRESENCE_INTERVAL_MS: u64 = 1000;

// =============================================================================
// SUBMISSION
// =============================================================================

/// Transport attempts before the host gives up on automatic retry
pub const MAX_SUBMIT_ATTEMPTS: u32 = 3;

/// Delay between automatic submission retries (milliseconds)
pub const SUBMIT_RETRY_BACKOFF_MS: u64 = 2000;

/// Exam backend request timeout (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Exam backend base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8068/";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
