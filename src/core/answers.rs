//! Answer ledger: the candidate's current selections keyed by question id

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::types::{AnswerSnapshot, OptionLabel, QuestionId};

#[derive(Debug, Clone)]
pub struct AnswerLedger {
    /// Ids of the questions on the paper
    known: BTreeSet<QuestionId>,
    selections: BTreeMap<QuestionId, OptionLabel>,
    /// Only an open ledger accepts answers
    open: bool,
}

impl AnswerLedger {
    /// Create a sealed ledger for the given question ids
    pub fn new(ids: impl IntoIterator<Item = QuestionId>) -> Self {
        Self {
            known: ids.into_iter().collect(),
            selections: BTreeMap::new(),
            open: false,
        }
    }

    /// Start accepting answers
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Stop accepting answers; later `set_answer` calls are dropped
    pub fn seal(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Upsert the choice for a question. Returns false (and changes nothing)
    /// when sealed or when the id is not on the paper.
    pub fn set_answer(&mut self, id: QuestionId, option: OptionLabel) -> bool {
        if !self.open || !self.known.contains(&id) {
            debug!(question = id, open = self.open, "answer ignored");
            return false;
        }
        self.selections.insert(id, option);
        true
    }

    pub fn answer(&self, id: QuestionId) -> Option<OptionLabel> {
        self.selections.get(&id).copied()
    }

    /// Owned copy of every answered question
    pub fn snapshot(&self) -> AnswerSnapshot {
        AnswerSnapshot::new(self.selections.clone())
    }

    pub fn attempted_count(&self) -> usize {
        self.selections.len()
    }

    pub fn unattempted_count(&self) -> usize {
        self.known.len() - self.selections.len()
    }

    pub fn question_count(&self) -> usize {
        self.known.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn open_ledger() -> AnswerLedger {
        let mut ledger = AnswerLedger::new([1, 2, 3]);
        ledger.open();
        ledger
    }

    #[test]
    fn test_sealed_by_default() {
        let mut ledger = AnswerLedger::new([1]);
        assert!(!ledger.set_answer(1, OptionLabel::A));
        assert_eq!(ledger.attempted_count(), 0);
    }

    #[test]
    fn test_upsert_overwrites() {
        let mut ledger = open_ledger();
        assert!(ledger.set_answer(1, OptionLabel::A));
        assert!(ledger.set_answer(1, OptionLabel::C));
        assert_eq!(ledger.answer(1), Some(OptionLabel::C));
        assert_eq!(ledger.attempted_count(), 1);
    }

    #[test]
    fn test_unknown_question_ignored() {
        let mut ledger = open_ledger();
        assert!(!ledger.set_answer(42, OptionLabel::B));
        assert!(ledger.snapshot().is_empty());
    }

    #[test]
    fn test_seal_rejects_without_clearing() {
        let mut ledger = open_ledger();
        ledger.set_answer(2, OptionLabel::D);
        ledger.seal();
        assert!(!ledger.set_answer(2, OptionLabel::A));
        assert_eq!(ledger.answer(2), Some(OptionLabel::D));
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut ledger = open_ledger();
        ledger.set_answer(1, OptionLabel::B);
        let snapshot = ledger.snapshot();

        ledger.set_answer(1, OptionLabel::A);
        ledger.set_answer(3, OptionLabel::C);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(1), Some(OptionLabel::B));
    }

    #[test]
    fn test_attempted_and_unattempted() {
        let mut ledger = open_ledger();
        ledger.set_answer(1, OptionLabel::A);
        ledger.set_answer(3, OptionLabel::B);
        assert_eq!(ledger.attempted_count(), 2);
        assert_eq!(ledger.unattempted_count(), 1);
        assert_eq!(ledger.question_count(), 3);
    }
}
