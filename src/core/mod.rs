//! Core modules for examguard

pub mod answers;
pub mod api;
pub mod clock;
pub mod command;
pub mod coordinator;
pub mod driver;
pub mod http_transport;
pub mod presence;
pub mod receipt;
pub mod session;
pub mod transport;
pub mod viewport;
pub mod violations;

pub use answers::AnswerLedger;
pub use api::{create_router, run_server, tick_all, AppState, TickSweep};
pub use clock::{format_remaining, ClockTick, SessionClock};
pub use command::{execute, Command};
pub use coordinator::{DeliveryOutcome, GateDecision, RetryDecision, SubmissionCoordinator, SubmissionGate};
pub use driver::{apply_event, drive, HostEvent};
pub use http_transport::HttpTransport;
pub use presence::{classify, poll_presence, PresenceReading, PresenceSignalSource, ScriptStep, ScriptedPresence};
pub use receipt::{load_receipt, save_receipt, Receipt};
pub use session::ExamSession;
pub use transport::{demo_paper, ExamQuestion, ExamStart, ExamTransport, InMemoryTransport};
pub use viewport::{RecordingViewport, ViewportGuard, ViewportHost, ViewportOutcome};
pub use violations::{RecordOutcome, ViolationLedger};
