//! Exam backend transport
//!
//! `startExam` resolves candidate + paper; `submitExam` delivers the answers
//! snapshot. Wire shapes follow the exam backend (camelCase JSON).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StartError, TransportError};
use crate::types::{AnswerSnapshot, CandidateIdentity, PaperIdentity, Question};

/// Transport collaborator consumed by the session core
#[async_trait]
pub trait ExamTransport: Send + Sync {
    /// Resolve the candidate's paper
    async fn start_exam(&self, candidate_name: &str, roll_no: &str) -> Result<ExamStart, StartError>;

    /// Deliver the answers for a roll number
    async fn submit_exam(&self, roll_no: &str, answers: &AnswerSnapshot) -> Result<(), TransportError>;
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// `conductExam` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamStart {
    pub candidate_name: String,
    pub exam_roll_no: String,
    pub set_name: String,
    #[serde(default)]
    pub paper_name: Option<String>,
    pub paper_id: u64,
    pub questions: Vec<ExamQuestion>,
}

/// Question as sent by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub id: u64,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
}

impl ExamQuestion {
    pub fn into_question(self) -> Question {
        Question::new(
            self.id,
            self.question_text,
            [self.option_a, self.option_b, self.option_c, self.option_d],
        )
    }
}

impl ExamStart {
    pub fn candidate(&self) -> CandidateIdentity {
        CandidateIdentity {
            roll_no: self.exam_roll_no.clone(),
            name: self.candidate_name.clone(),
        }
    }

    pub fn paper(&self) -> PaperIdentity {
        PaperIdentity {
            paper_id: self.paper_id,
            set_name: self.set_name.clone(),
            paper_name: self.paper_name.clone(),
        }
    }

    /// Paper must have at least one question and unique ids
    pub fn validate(&self) -> Result<(), StartError> {
        if self.questions.is_empty() {
            return Err(StartError::InvalidPaper("paper has no questions".to_string()));
        }
        let mut seen = HashSet::new();
        for q in &self.questions {
            if !seen.insert(q.id) {
                return Err(StartError::InvalidPaper(format!("duplicate question id {}", q.id)));
            }
        }
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY BACKEND
// =============================================================================

/// One accepted submission, as seen by the in-memory backend
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedSubmission {
    pub roll_no: String,
    pub answers: AnswerSnapshot,
}

/// Backend double: paper bank, completion tracking, scripted failures and
/// a counter of every `submit_exam` invocation.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    papers: Mutex<HashMap<String, ExamStart>>,
    completed: Mutex<HashSet<String>>,
    failures: Mutex<VecDeque<TransportError>>,
    received: Mutex<Vec<ReceivedSubmission>>,
    submit_calls: AtomicU32,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend holding the built-in demo paper for one candidate
    pub fn with_demo_paper(candidate_name: &str, roll_no: &str) -> Self {
        let transport = Self::new();
        transport.add_paper(demo_paper(candidate_name, roll_no));
        transport
    }

    pub fn add_paper(&self, paper: ExamStart) {
        lock(&self.papers).insert(paper.exam_roll_no.clone(), paper);
    }

    /// Mark a roll number as having already sat the exam
    pub fn mark_completed(&self, roll_no: &str) {
        lock(&self.completed).insert(roll_no.to_string());
    }

    /// Fail the next `submit_exam` call with `error`
    pub fn fail_next_submit(&self, error: TransportError) {
        lock(&self.failures).push_back(error);
    }

    /// Every `submit_exam` invocation, successful or not
    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<ReceivedSubmission> {
        lock(&self.received).clone()
    }
}

#[async_trait]
impl ExamTransport for InMemoryTransport {
    async fn start_exam(&self, candidate_name: &str, roll_no: &str) -> Result<ExamStart, StartError> {
        if lock(&self.completed).contains(roll_no) {
            return Err(StartError::AlreadyCompleted);
        }
        let papers = lock(&self.papers);
        match papers.get(roll_no) {
            Some(paper) if paper.candidate_name.eq_ignore_ascii_case(candidate_name.trim()) => {
                Ok(paper.clone())
            }
            _ => Err(StartError::NotFound(roll_no.to_string())),
        }
    }

    async fn submit_exam(&self, roll_no: &str, answers: &AnswerSnapshot) -> Result<(), TransportError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = lock(&self.failures).pop_front() {
            return Err(error);
        }
        if !lock(&self.completed).insert(roll_no.to_string()) {
            return Err(TransportError::Rejected(format!(
                "exam for {} already submitted",
                roll_no
            )));
        }
        lock(&self.received).push(ReceivedSubmission {
            roll_no: roll_no.to_string(),
            answers: answers.clone(),
        });
        Ok(())
    }
}

/// Poisoning only follows a panic elsewhere; keep serving the data
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Five-question sample paper (set A)
pub fn demo_paper(candidate_name: &str, roll_no: &str) -> ExamStart {
    let q = |id: u64, text: &str, opts: [&str; 4]| ExamQuestion {
        id,
        question_text: text.to_string(),
        option_a: opts[0].to_string(),
        option_b: opts[1].to_string(),
        option_c: opts[2].to_string(),
        option_d: opts[3].to_string(),
    };

    ExamStart {
        candidate_name: candidate_name.to_string(),
        exam_roll_no: roll_no.to_string(),
        set_name: "A".to_string(),
        paper_name: Some("General Aptitude".to_string()),
        paper_id: 101,
        questions: vec![
            q(1, "Which planet is closest to the Sun?", ["Venus", "Mercury", "Earth", "Mars"]),
            q(2, "What is 12 x 12?", ["124", "144", "132", "154"]),
            q(3, "Which gas do plants absorb?", ["Oxygen", "Nitrogen", "Carbon dioxide", "Helium"]),
            q(4, "How many sides does a hexagon have?", ["5", "6", "7", "8"]),
            q(5, "Which is a prime number?", ["21", "27", "29", "33"]),
        ],
    }
}

// =============================================================================
// TESTS
// =============================================================================
