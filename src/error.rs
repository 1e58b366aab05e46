//! Error types for the collaborators around the session core.
//!
//! Session state transitions never fail; only the transport, the camera,
//! the viewport host and the configuration/receipt layers do.

use thiserror::Error;

/// Failures of `startExam`. Any of these prevents an `ExamSession` from
/// being constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    /// Candidate name / roll number pair not known to the backend
    #[error("No exam found for roll number {0}")]
    NotFound(String),

    /// Candidate already sat this exam
    #[error("You have already completed the exam. Multiple attempts are not allowed")]
    AlreadyCompleted,

    /// Backend failed to produce a paper
    #[error("Server error: {0}")]
    ServerError(String),

    /// Backend unreachable
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Paper payload could not be turned into questions
    #[error("Invalid paper: {0}")]
    InvalidPaper(String),
}

/// Failures of `submitExam`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Request never completed (connect, timeout, reset)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Backend answered 5xx
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Backend refused the record, e.g. already submitted server-side
    #[error("Submission rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Network and server errors may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Rejected(_))
    }
}

/// Presence collaborator could not produce a face count this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PresenceError {
    #[error("Face model not loaded")]
    ModelUnavailable,

    #[error("Video frame not ready")]
    FrameUnavailable,
}

/// Viewport host refused a fullscreen request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewportError {
    #[error("Fullscreen request denied: {0}")]
    RequestDenied(String),
}

/// Malformed operator input: option labels, presence scripts, console lines
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown option '{0}', expected A-D")]
    InvalidOption(String),

    #[error("invalid presence step '{0}'")]
    InvalidPresenceStep(String),

    #[error("invalid {field} '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("tick count must be 1..={0}")]
    TickOutOfRange(u32),

    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),
}

/// Invalid or unreadable configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Receipt persistence failures
#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("Receipt storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Receipt serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Session has no submission record yet")]
    NoRecord,

    #[error("Receipt digest does not match its record")]
    DigestMismatch,
}
