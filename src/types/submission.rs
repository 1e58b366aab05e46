//! Submission record types
//!
//! A `SubmissionRecord` is built once, when the submission gate closes, and
//! re-sent unchanged on every retry.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::{CandidateIdentity, OptionLabel, PaperIdentity, QuestionId};

/// Which signal won the race into `Submitting`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionTrigger {
    TimeExpired,
    ViolationThreshold,
    Manual,
}

impl std::fmt::Display for SubmissionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubmissionTrigger::TimeExpired => "TIME_EXPIRED",
            SubmissionTrigger::ViolationThreshold => "VIOLATION_THRESHOLD",
            SubmissionTrigger::Manual => "MANUAL",
        };
        write!(f, "{}", name)
    }
}

/// Immutable copy of the answered questions (id → option)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSnapshot(BTreeMap<QuestionId, OptionLabel>);

impl AnswerSnapshot {
    pub fn new(answers: BTreeMap<QuestionId, OptionLabel>) -> Self {
        Self(answers)
    }

    pub fn get(&self, id: QuestionId) -> Option<OptionLabel> {
        self.0.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, &OptionLabel)> {
        self.0.iter()
    }

    /// Wire shape expected by the exam backend: `{"<id>": "<option>"}`
    pub fn to_wire(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|(id, opt)| (id.to_string(), opt.as_str().to_string()))
            .collect()
    }
}

/// The single record produced per exam session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub candidate: CandidateIdentity,
    pub paper: PaperIdentity,
    /// Only answered questions are present
    pub answers: AnswerSnapshot,
    pub triggered_by: SubmissionTrigger,
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(
        candidate: CandidateIdentity,
        paper: PaperIdentity,
        answers: AnswerSnapshot,
        triggered_by: SubmissionTrigger,
    ) -> Self {
        Self {
            candidate,
            paper,
            answers,
            triggered_by,
            submitted_at: Utc::now(),
        }
    }

    /// SHA-256 over the record content (hex).
    ///
    /// Covers roll number, paper id, trigger, creation time and every answer
    /// in id order, so two deliveries with equal digests carried the same
    /// record.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.candidate.roll_no.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.paper.paper_id.to_be_bytes());
        hasher.update(self.triggered_by.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.submitted_at.timestamp_millis().to_be_bytes());
        for (id, opt) in self.answers.iter() {
            hasher.update(id.to_be_bytes());
            hasher.update(opt.as_str().as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(answers: &[(QuestionId, OptionLabel)]) -> SubmissionRecord {
        SubmissionRecord::new(
            CandidateIdentity {
                roll_no: "R-1".to_string(),
                name: "Asha".to_string(),
            },
            PaperIdentity {
                paper_id: 7,
                set_name: "B".to_string(),
                paper_name: None,
            },
            AnswerSnapshot::new(answers.iter().copied().collect()),
            SubmissionTrigger::Manual,
        )
    }

    #[test]
    fn test_wire_shape() {
        let snapshot = AnswerSnapshot::new([(10, OptionLabel::D), (2, OptionLabel::A)].into_iter().collect());
        let wire = serde_json::to_string(&snapshot.to_wire()).unwrap();
        assert_eq!(wire, r#"{"10":"D","2":"A"}"#);
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = record(&[(1, OptionLabel::A)]);
        let mut b = a.clone();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);

        b.answers = AnswerSnapshot::new([(1, OptionLabel::B)].into_iter().collect());
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_survives_serde() {
        let a = record(&[(3, OptionLabel::C), (4, OptionLabel::A)]);
        let back: SubmissionRecord = serde_json::from_str(&serde_json::to_string(&a).unwrap()).unwrap();
        assert_eq!(back.digest(), a.digest());
    }
}
