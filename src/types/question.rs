//! Paper, question and identity types

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Question identifier, unique within a paper
pub type QuestionId = u64;

/// The four labelled choices of a multiple-choice question
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    /// All labels in display order
    pub const ALL: [OptionLabel; 4] = [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    /// Position of this label in `Question::options`
    pub fn index(&self) -> usize {
        match self {
            OptionLabel::A => 0,
            OptionLabel::B => 1,
            OptionLabel::C => 2,
            OptionLabel::D => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionLabel::A => "A",
            OptionLabel::B => "B",
            OptionLabel::C => "C",
            OptionLabel::D => "D",
        }
    }
}

impl std::fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OptionLabel {
    type Err = ParseError;

    /// Case-insensitive `A`..`D`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(OptionLabel::A),
            "B" => Ok(OptionLabel::B),
            "C" => Ok(OptionLabel::C),
            "D" => Ok(OptionLabel::D),
            other => Err(ParseError::InvalidOption(other.to_string())),
        }
    }
}

/// One multiple-choice question. The candidate's selection lives in the
/// answer ledger, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    /// Option texts indexed by `OptionLabel::index`
    pub options: [String; 4],
}

impl Question {
    pub fn new(id: QuestionId, text: impl Into<String>, options: [String; 4]) -> Self {
        Self {
            id,
            text: text.into(),
            options,
        }
    }

    /// Text of one option
    pub fn option(&self, label: OptionLabel) -> &str {
        &self.options[label.index()]
    }
}

/// Who is sitting the exam. Fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateIdentity {
    /// Exam roll number (opaque identifier used by the backend)
    pub roll_no: String,
    pub name: String,
}

/// Which question set was assigned. Fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperIdentity {
    pub paper_id: u64,
    /// Set letter assigned by the backend (e.g. "A")
    pub set_name: String,
    pub paper_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_label_parse() {
        assert_eq!("a".parse::<OptionLabel>(), Ok(OptionLabel::A));
        assert_eq!(" D ".parse::<OptionLabel>(), Ok(OptionLabel::D));
        assert_eq!(
            "e".parse::<OptionLabel>(),
            Err(ParseError::InvalidOption("E".to_string()))
        );
    }

    #[test]
    fn test_option_lookup() {
        let q = Question::new(
            1,
            "Pick one",
            ["w".to_string(), "x".to_string(), "y".to_string(), "z".to_string()],
        );
        for (label, text) in OptionLabel::ALL.iter().zip(["w", "x", "y", "z"]) {
            assert_eq!(q.option(*label), text);
        }
    }
}
