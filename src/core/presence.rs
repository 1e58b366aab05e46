//! Presence signal consumption
//!
//! The face classifier lives in the host; the core only sees a face count
//! per cycle, or a reason why there is none this cycle.
//!
//! Consumption rule:
//! - 0 faces  → `FaceMissing`
//! - >1 faces → `MultipleFaces`
//! - 1 face   → no violation
//! - unavailable (frame not ready, model not loaded) → skipped, never a violation

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::{ParseError, PresenceError};
use crate::types::Violation;

/// Camera-based presence collaborator
#[async_trait]
pub trait PresenceSignalSource: Send {
    /// Readiness check: is the current video frame decodable?
    fn frame_ready(&mut self) -> bool;

    /// Run the classifier on the current frame
    async fn detect_faces(&mut self) -> Result<usize, PresenceError>;
}

/// Outcome of one presence cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceReading {
    Faces(usize),
    Unavailable(PresenceError),
}

/// Readiness check followed by inference, folded into one reading
pub async fn poll_presence<P>(source: &mut P) -> PresenceReading
where
    P: PresenceSignalSource + ?Sized,
{
    if !source.frame_ready() {
        return PresenceReading::Unavailable(PresenceError::FrameUnavailable);
    }
    match source.detect_faces().await {
        Ok(count) => PresenceReading::Faces(count),
        Err(e) => PresenceReading::Unavailable(e),
    }
}

/// Map a face count to the violation it implies, if any
pub fn classify(count: usize) -> Option<Violation> {
    match count {
        0 => Some(Violation::face_missing()),
        1 => None,
        n => Some(Violation::multiple_faces(n)),
    }
}

// =============================================================================
// SCRIPTED SOURCE
// =============================================================================

/// One scripted presence cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStep {
    Faces(usize),
    ModelUnavailable,
    FrameNotReady,
}

/// Presence double replaying a fixed script.
///
/// The last step repeats once the script is exhausted; an empty script
/// always reports one face.
#[derive(Debug, Clone)]
pub struct ScriptedPresence {
    steps: VecDeque<ScriptStep>,
    last: ScriptStep,
    polls: u32,
}

impl ScriptedPresence {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            last: ScriptStep::Faces(1),
            polls: 0,
        }
    }

    /// Candidate always visible
    pub fn steady() -> Self {
        Self::new([])
    }

    /// Parse a compact script: `"1,1,0,2,x,-"`.
    /// Digits are face counts, `x` = model unavailable, `-` = frame not ready.
    pub fn parse(script: &str) -> Result<Self, ParseError> {
        let steps = script
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "x" | "X" => Ok(ScriptStep::ModelUnavailable),
                "-" => Ok(ScriptStep::FrameNotReady),
                n => n
                    .parse::<usize>()
                    .map(ScriptStep::Faces)
                    .map_err(|_| ParseError::InvalidPresenceStep(n.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(steps))
    }

    fn peek(&self) -> ScriptStep {
        self.steps.front().copied().unwrap_or(self.last)
    }

    fn advance(&mut self) -> ScriptStep {
        if let Some(step) = self.steps.pop_front() {
            self.last = step;
        }
        self.polls += 1;
        self.last
    }

    /// Cycles consumed so far
    pub fn polls(&self) -> u32 {
        self.polls
    }
}

#[async_trait]
impl PresenceSignalSource for ScriptedPresence {
    fn frame_ready(&mut self) -> bool {
        if self.peek() == ScriptStep::FrameNotReady {
            self.advance();
            return false;
        }
        true
    }

    async fn detect_faces(&mut self) -> Result<usize, PresenceError> {
        match self.advance() {
            ScriptStep::Faces(n) => Ok(n),
            ScriptStep::ModelUnavailable => Err(PresenceError::ModelUnavailable),
            ScriptStep::FrameNotReady => Err(PresenceError::FrameUnavailable),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
