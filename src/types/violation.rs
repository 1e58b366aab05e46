//! Integrity violations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of integrity anomaly was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// Presence check saw no face
    FaceMissing,
    /// Presence check saw more than one face
    MultipleFaces,
    /// Fullscreen / foreground context was lost
    ViewportLost,
}

impl ViolationKind {
    /// Human-readable label, as shown in the proctoring sidebar
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::FaceMissing => "Face Missing",
            ViolationKind::MultipleFaces => "Multiple Faces",
            ViolationKind::ViewportLost => "Fullscreen Exit",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One recorded violation. Append-only once in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Free-text detail
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

impl Violation {
    /// Create a violation stamped with the current time
    pub fn new(kind: ViolationKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            occurred_at: Utc::now(),
        }
    }

    pub fn face_missing() -> Self {
        Self::new(ViolationKind::FaceMissing, "No face detected.")
    }

    pub fn multiple_faces(count: usize) -> Self {
        Self::new(
            ViolationKind::MultipleFaces,
            format!("Detected {} faces.", count),
        )
    }

    pub fn viewport_lost() -> Self {
        Self::new(ViolationKind::ViewportLost, "Exited fullscreen mode.")
    }

    /// Sidebar line: `[HH:MM:SS] Face Missing`
    pub fn to_log_line(&self) -> String {
        format!("[{}] {}", self.occurred_at.format("%H:%M:%S"), self.kind)
    }
}
