//! Console commands for driving a session headlessly
//!
//! ```text
//! answer <qid> <A-D>   pick an option
//! faces <n>            presence cycle with n faces
//! faces none           presence cycle with the model unavailable
//! blur | focus         viewport lost / restored
//! tick [n]             advance the clock n seconds (default 1)
//! submit | retry | status | help | quit
//! ```

use lazy_static::lazy_static;
use regex::Regex;

use crate::core::driver::HostEvent;
use crate::core::presence::PresenceReading;
use crate::core::session::ExamSession;
use crate::core::transport::ExamTransport;
use crate::core::viewport::ViewportHost;
use crate::error::{ParseError, PresenceError};
use crate::types::{OptionLabel, QuestionId, SessionOutput};

lazy_static! {
    static ref RE_ANSWER: Regex = Regex::new(r"(?i)^answer\s+(\d+)\s+([a-d])$").unwrap();
    static ref RE_FACES: Regex = Regex::new(r"(?i)^faces\s+(\d+|none)$").unwrap();
    static ref RE_TICK: Regex = Regex::new(r"(?i)^tick(?:\s+(\d+))?$").unwrap();
}

/// Upper bound for a single `tick n`
pub const MAX_TICKS_PER_COMMAND: u32 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Answer { question: QuestionId, option: OptionLabel },
    Faces(usize),
    FacesUnavailable,
    Blur,
    Focus,
    Tick(u32),
    Submit,
    Retry,
    Status,
    Help,
    Quit,
}

impl Command {
    /// Parse one console line. Blank lines are an error too.
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let line = line.trim();

        if let Some(caps) = RE_ANSWER.captures(line) {
            let question = caps[1]
                .parse::<QuestionId>()
                .map_err(|_| ParseError::InvalidNumber {
                    field: "question id",
                    value: caps[1].to_string(),
                })?;
            let option = caps[2].parse::<OptionLabel>()?;
            return Ok(Command::Answer { question, option });
        }

        if let Some(caps) = RE_FACES.captures(line) {
            if caps[1].eq_ignore_ascii_case("none") {
                return Ok(Command::FacesUnavailable);
            }
            return caps[1]
                .parse::<usize>()
                .map(Command::Faces)
                .map_err(|_| ParseError::InvalidNumber {
                    field: "face count",
                    value: caps[1].to_string(),
                });
        }

        if let Some(caps) = RE_TICK.captures(line) {
            let n = match caps.get(1) {
                Some(m) => m
                    .as_str()
                    .parse::<u32>()
                    .map_err(|_| ParseError::InvalidNumber {
                        field: "tick count",
                        value: m.as_str().to_string(),
                    })?,
                None => 1,
            };
            if n == 0 || n > MAX_TICKS_PER_COMMAND {
                return Err(ParseError::TickOutOfRange(MAX_TICKS_PER_COMMAND));
            }
            return Ok(Command::Tick(n));
        }

        match line.to_ascii_lowercase().as_str() {
            "blur" => Ok(Command::Blur),
            "focus" => Ok(Command::Focus),
            "submit" => Ok(Command::Submit),
            "retry" => Ok(Command::Retry),
            "status" => Ok(Command::Status),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "" => Err(ParseError::EmptyCommand),
            other => Err(ParseError::UnknownCommand(other.to_string())),
        }
    }

    /// Event a live host would raise for this command. Clock and presence
    /// commands have none; the event loop owns those sources.
    pub fn to_host_event(self) -> Option<HostEvent> {
        match self {
            Command::Answer { question, option } => Some(HostEvent::Answer { question, option }),
            Command::Blur => Some(HostEvent::ViewportLost),
            Command::Focus => Some(HostEvent::ViewportRestored),
            Command::Submit => Some(HostEvent::Submit),
            Command::Retry => Some(HostEvent::Retry),
            _ => None,
        }
    }
}

pub const HELP: &str = "\
answer <qid> <A-D>   pick an option
faces <n>            presence cycle with n faces
faces none           presence cycle with the model unavailable
blur | focus         viewport lost / restored
tick [n]             advance the clock n seconds
submit               submit now
retry                retry a failed submission
status               show current state
quit                 leave";

/// Apply a command and deliver the record if the command closed the gate.
/// Returns every output produced, in order.
pub async fn execute<T>(
    session: &mut ExamSession,
    command: Command,
    host: &mut dyn ViewportHost,
    transport: &T,
) -> Vec<SessionOutput>
where
    T: ExamTransport + ?Sized,
{
    let mut outputs = Vec::new();

    match command {
        Command::Answer { question, option } => outputs.push(session.set_answer(question, option)),
        Command::Faces(n) => outputs.push(session.observe_presence(PresenceReading::Faces(n))),
        Command::FacesUnavailable => outputs.push(
            session.observe_presence(PresenceReading::Unavailable(PresenceError::ModelUnavailable)),
        ),
        Command::Blur => outputs.push(session.viewport_lost(host)),
        Command::Focus => outputs.push(session.viewport_restored()),
        Command::Tick(n) => {
            for _ in 0..n {
                outputs.push(session.tick());
                if !session.state().is_active() {
                    break;
                }
            }
        }
        Command::Submit => outputs.push(session.request_submit()),
        Command::Retry => outputs.push(session.retry()),
        Command::Status | Command::Help | Command::Quit => outputs.push(session.status()),
    }

    if session.pending_delivery() {
        outputs.push(session.deliver(transport).await);
    }
    outputs
}

// =============================================================================
// TESTS
// =============================================================================
