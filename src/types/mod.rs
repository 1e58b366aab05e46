//! Core types for Examguard

mod output;
mod question;
mod reason;
mod state;
mod submission;
mod violation;

pub use output::{SessionOutput, SessionSummary};
pub use question::{CandidateIdentity, OptionLabel, PaperIdentity, Question, QuestionId};
pub use reason::ReasonCode;
pub use state::SessionState;
pub use submission::{AnswerSnapshot, SubmissionRecord, SubmissionTrigger};
pub use violation::{Violation, ViolationKind};
