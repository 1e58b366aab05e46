//! examguard CLI
//!
//! Usage:
//!   examguard --name "Asha Rao" --roll R-1042               # Live run against the exam backend
//!   examguard --name Asha --roll R-1 --offline              # Demo paper, in-memory backend
//!   examguard --name Asha --roll R-1 --offline --interactive # Drive the session by hand
//!   examguard --serve                                       # HTTP API server
//!   examguard ... --json                                    # JSON output

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use examguard::config::ExamConfig;
use examguard::core::command::{execute, Command, HELP};
use examguard::core::{
    drive, run_server, save_receipt, ExamSession, ExamTransport, HttpTransport, InMemoryTransport,
    RecordingViewport, ScriptedPresence,
};
use examguard::error::{ConfigError, StartError};
use examguard::types::{SessionOutput, SessionState};
use examguard::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "examguard",
    version = VERSION,
    about = "Proctored exam session controller",
    long_about = "examguard runs one proctored exam session: it owns the exam clock,\n\
                  counts integrity violations (face missing, multiple faces, fullscreen\n\
                  exit) and guarantees exactly one submission, whichever comes first:\n\
                  time expiry, the violation limit, or a manual submit.\n\n\
                  Modes:\n  \
                  (default)      Timed run with scripted presence; stdin commands\n  \
                  --interactive  Manual clock and presence via console commands\n  \
                  --serve        HTTP API server for browser front-ends\n\n\
                  States:\n  \
                  AWAITING_START - Paper loaded, exam not started\n  \
                  ACTIVE         - Clock running, violations counted\n  \
                  SUBMITTING     - Record built, delivery in progress\n  \
                  SUBMITTED      - Backend accepted the record\n  \
                  FAILED         - Delivery failed (retry if retryable)"
)]
struct Args {
    /// Candidate name as registered with the backend
    #[arg(long)]
    name: Option<String>,

    /// Exam roll number
    #[arg(long)]
    roll: Option<String>,

    /// Use the built-in demo paper and an in-memory backend
    #[arg(long)]
    offline: bool,

    /// Exam backend base URL (overrides config / EXAM_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// JSON config file
    #[arg(long)]
    config: Option<String>,

    /// Exam duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Violations before forced submission
    #[arg(long)]
    max_violations: Option<u32>,

    /// Fixed seed for question order
    #[arg(long)]
    seed: Option<u64>,

    /// Presence script for timed runs, e.g. "1,1,0,2,x,-"
    #[arg(long)]
    presence_script: Option<String>,

    /// Console mode: clock and presence advanced by commands
    #[arg(short, long)]
    interactive: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Directory for submission receipts (disabled when unset)
    #[arg(long)]
    receipt_dir: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing();

    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "config error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if args.serve {
        run_serve(&args, config).await;
        return;
    }

    let (Some(name), Some(roll)) = (args.name.clone(), args.roll.clone()) else {
        eprintln!("{} --name and --roll are required", "error:".red().bold());
        std::process::exit(1);
    };

    let transport = build_transport(&args, &config, &name, &roll);
    let session = match ExamSession::open(transport.as_ref(), &name, &roll, &config).await {
        Ok(session) => session,
        Err(e) => {
            report_start_error(&e);
            let code = if e == StartError::AlreadyCompleted { 2 } else { 1 };
            std::process::exit(code);
        }
    };

    print_header(&session, &args);

    let session = if args.interactive {
        run_interactive(session, transport.as_ref(), &args).await
    } else {
        run_timed(session, transport.as_ref(), &config, &args).await
    };

    finish(&session, &args);
}

/// `RUST_LOG` filter, default `info`, logs on stderr
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

/// Defaults → config file → environment → flags
fn load_config(args: &Args) -> Result<ExamConfig, ConfigError> {
    let base = match &args.config {
        Some(path) => ExamConfig::from_file(path)?,
        None => ExamConfig::default(),
    };
    let mut config = base.with_env()?;

    if let Some(duration) = args.duration {
        config.duration_secs = duration;
    }
    if let Some(max) = args.max_violations {
        config.max_violations = max;
    }
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if args.seed.is_some() {
        config.shuffle_seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

fn build_transport(args: &Args, config: &ExamConfig, name: &str, roll: &str) -> Arc<dyn ExamTransport> {
    if args.offline {
        info!("offline mode, using demo paper");
        return Arc::new(InMemoryTransport::with_demo_paper(name, roll));
    }
    match HttpTransport::from_config(config) {
        Ok(transport) => {
            info!(base_url = %transport.base_url(), "using exam backend");
            Arc::new(transport)
        }
        Err(e) => {
            eprintln!("{} {}", "transport error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Timed run: real clock, scripted presence, host events from stdin
async fn run_timed(
    mut session: ExamSession,
    transport: &dyn ExamTransport,
    config: &ExamConfig,
    args: &Args,
) -> ExamSession {
    let mut presence = match &args.presence_script {
        Some(script) => match ScriptedPresence::parse(script) {
            Ok(presence) => presence,
            Err(e) => {
                eprintln!("{} {}", "presence script:".red().bold(), e);
                std::process::exit(1);
            }
        },
        None => ScriptedPresence::steady(),
    };
    let mut viewport = RecordingViewport::new();

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match Command::parse(&line).map(Command::to_host_event) {
                Ok(Some(event)) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Ok(None) => eprintln!("only answer/blur/focus/submit/retry are available in timed mode"),
                Err(e) => eprintln!("{}", e),
            }
        }
    });

    if !args.json {
        println!("Commands: answer <qid> <A-D>, blur, focus, submit, retry");
        println!();
    }

    let json = args.json;
    let no_color = args.no_color;
    drive(
        &mut session,
        &mut presence,
        &mut viewport,
        transport,
        rx,
        config,
        |out| print_output(out, json, no_color, true),
    )
    .await;
    session
}

/// Console mode: every command is applied immediately
async fn run_interactive(mut session: ExamSession, transport: &dyn ExamTransport, args: &Args) -> ExamSession {
    let mut viewport = RecordingViewport::new();
    print_output(&session.start(&mut viewport), args.json, args.no_color, false);

    if !args.json {
        println!("{}", HELP.dimmed());
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e.to_string().yellow());
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            _ => {}
        }

        for out in execute(&mut session, command, &mut viewport, transport).await {
            print_output(&out, args.json, args.no_color, false);
        }

        if session.is_terminal() {
            break;
        }
        if session.state() == SessionState::Failed {
            println!("{}", "Submission failed. Type 'retry' to try again.".yellow());
        }
    }
    session
}

/// Timed mode skips the per-second tick lines
fn print_output(out: &SessionOutput, json: bool, no_color: bool, quiet_ticks: bool) {
    use examguard::types::ReasonCode;

    if quiet_ticks && out.reason == ReasonCode::R103_CLOCK_TICK && out.time_remaining % 60 != 0 {
        return;
    }
    if json {
        println!("{}", serde_json::to_string(out).unwrap_or_default());
    } else if no_color {
        println!("{}", out.to_parseable_string());
    } else {
        println!("{}", out.to_terminal_string());
    }
}

fn print_header(session: &ExamSession, args: &Args) {
    if args.json {
        return;
    }
    let candidate = session.candidate();
    let paper = session.paper();
    println!("{}", format!("examguard v{}", VERSION).bold());
    println!(
        "Candidate: {} ({}) | Set {}{} | {} questions",
        candidate.name,
        candidate.roll_no,
        paper.set_name,
        paper
            .paper_name
            .as_deref()
            .map(|n| format!(" - {}", n))
            .unwrap_or_default(),
        session.questions().len()
    );
    for (i, q) in session.questions().iter().enumerate() {
        println!("  Q{} [id {}] {}", i + 1, q.id, q.text);
        println!(
            "     A) {}  B) {}  C) {}  D) {}",
            q.options[0], q.options[1], q.options[2], q.options[3]
        );
    }
    println!();
}

fn report_start_error(e: &StartError) {
    match e {
        StartError::AlreadyCompleted => {
            eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
        }
        _ => eprintln!("{} {}", "could not start exam:".red().bold(), e),
    }
}

/// Summary, optional receipt, exit status
fn finish(session: &ExamSession, args: &Args) {
    let summary = session.summary();

    if args.json {
        println!("{}", serde_json::to_string(&summary).unwrap_or_default());
    } else {
        println!();
        match summary.state {
            SessionState::Submitted => println!("{}", "✓ Exam submitted successfully".green().bold()),
            SessionState::Failed => println!("{}", "✗ Exam submission failed".red().bold()),
            _ => println!("{}", format!("Session ended in state {}", summary.state).yellow()),
        }
        if let Some(trigger) = summary.triggered_by {
            println!("  Triggered by: {}", trigger);
        }
        println!("  Attempted: {}", summary.attempted);
        println!("  Unattempted: {}", summary.unattempted);
        println!("  Violations: {}", summary.violation_count);
        for violation in session.recent_violations(5) {
            println!("    {}", violation.to_log_line().dimmed());
        }
        println!("  Submit attempts: {}", summary.submit_attempts);
        if let Some(e) = session.last_error() {
            println!("  Last error: {}", e.to_string().red());
        }
    }

    if let Some(dir) = &args.receipt_dir {
        if session.record().is_some() {
            match save_receipt(session, dir) {
                Ok(path) if !args.json => println!("  Receipt: {}", path.display().to_string().cyan()),
                Ok(_) => {}
                Err(e) => eprintln!("{} {}", "receipt not saved:".red(), e),
            }
        }
    }

    if summary.state != SessionState::Submitted {
        std::process::exit(1);
    }
}

/// Run HTTP API server
async fn run_serve(args: &Args, config: ExamConfig) {
    println!();
    println!("{}", format!("📝 examguard API server v{}", VERSION).bold());
    println!();

    let transport: Arc<dyn ExamTransport> = if args.offline {
        let transport = InMemoryTransport::new();
        if let (Some(name), Some(roll)) = (&args.name, &args.roll) {
            transport.add_paper(examguard::core::demo_paper(name, roll));
        }
        Arc::new(transport)
    } else {
        match HttpTransport::from_config(&config) {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                eprintln!("{} {}", "transport error:".red().bold(), e);
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = run_server(&args.addr, transport, config, args.receipt_dir.clone()).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
