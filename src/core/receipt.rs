//! Submission receipts
//!
//! A receipt is written once the session has a record: the record itself,
//! the post-submission summary and the record digest. Reading one back
//! re-computes the digest.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::session::ExamSession;
use crate::error::ReceiptError;
use crate::types::{SessionState, SessionSummary, SubmissionRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub saved_at: DateTime<Utc>,
    pub state: SessionState,
    pub submit_attempts: u32,
    pub digest: String,
    pub record: SubmissionRecord,
    pub summary: SessionSummary,
}

impl Receipt {
    pub fn from_session(session: &ExamSession) -> Result<Self, ReceiptError> {
        let record = session.record().ok_or(ReceiptError::NoRecord)?.clone();
        let digest = record.digest();
        let id = format!(
            "receipt_{}_{}_{}",
            sanitize(&record.candidate.roll_no),
            record.submitted_at.format("%Y%m%d_%H%M%S"),
            &digest[..8]
        );

        Ok(Self {
            id,
            saved_at: Utc::now(),
            state: session.state(),
            submit_attempts: session.submit_attempts(),
            digest,
            record,
            summary: session.summary(),
        })
    }

    /// Digest stored alongside the record still matches it
    pub fn is_consistent(&self) -> bool {
        self.record.digest() == self.digest
    }
}

/// Write `<dir>/<receipt id>.json`, creating `dir` if needed
pub fn save_receipt(session: &ExamSession, dir: impl AsRef<Path>) -> Result<PathBuf, ReceiptError> {
    let receipt = Receipt::from_session(session)?;
    let dir = dir.as_ref();
    let path = dir.join(format!("{}.json", receipt.id));

    let json = serde_json::to_string_pretty(&receipt)?;
    std::fs::create_dir_all(dir)?;
    std::fs::write(&path, json)?;

    info!(path = %path.display(), digest = %receipt.digest, "receipt saved");
    Ok(path)
}

/// Read a receipt and check its digest
pub fn load_receipt(path: impl AsRef<Path>) -> Result<Receipt, ReceiptError> {
    let json = std::fs::read_to_string(path)?;
    let receipt: Receipt = serde_json::from_str(&json)?;
    if !receipt.is_consistent() {
        return Err(ReceiptError::DigestMismatch);
    }
    Ok(receipt)
}

fn sanitize(roll_no: &str) -> String {
    roll_no
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExamConfig;
    use crate::core::transport::{demo_paper, InMemoryTransport};
    use crate::core::viewport::RecordingViewport;
    use crate::types::{OptionLabel, SubmissionTrigger};

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("examguard_{}_{}", name, uuid::Uuid::new_v4()))
    }

    async fn submitted_session() -> ExamSession {
        let transport = InMemoryTransport::with_demo_paper("Asha", "R/1");
        let mut session = ExamSession::open(&transport, "Asha", "R/1", &ExamConfig::default())
            .await
            .unwrap();
        session.start(&mut RecordingViewport::new());
        session.set_answer(2, OptionLabel::B);
        session.request_submit();
        session.deliver(&transport).await;
        session
    }

    #[test]
    fn test_no_record_no_receipt() {
        let session = ExamSession::from_start(demo_paper("Asha", "R-1"), &ExamConfig::default()).unwrap();
        assert!(matches!(
            save_receipt(&session, temp_dir("none")),
            Err(ReceiptError::NoRecord)
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let session = submitted_session().await;
        let dir = temp_dir("save");

        let path = save_receipt(&session, &dir).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("receipt_R_1_"));

        let receipt = load_receipt(&path).unwrap();
        assert_eq!(receipt.state, SessionState::Submitted);
        assert_eq!(receipt.record.triggered_by, SubmissionTrigger::Manual);
        assert_eq!(receipt.record.answers.get(2), Some(OptionLabel::B));
        assert_eq!(receipt.summary.attempted, 1);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_tampered_receipt_rejected() {
        let session = submitted_session().await;
        let dir = temp_dir("tamper");
        let path = save_receipt(&session, &dir).unwrap();

        let mut receipt = load_receipt(&path).unwrap();
        receipt.record.candidate.roll_no = "R-2".to_string();
        std::fs::write(&path, serde_json::to_string(&receipt).unwrap()).unwrap();

        assert!(matches!(load_receipt(&path), Err(ReceiptError::DigestMismatch)));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            load_receipt("/nonexistent/receipt.json"),
            Err(ReceiptError::Storage(_))
        ));
    }
}
