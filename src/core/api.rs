//! HTTP + WebSocket host for browser front-ends
//!
//! Endpoints:
//! - GET /health - Health check
//! - POST /exam/start - Verify candidate, fetch paper, start session
//! - GET /exam/{id} - Session status and summary
//! - DELETE /exam/{id} - Acknowledge a finished session and discard it
//! - POST /exam/{id}/answer - Pick an option
//! - POST /exam/{id}/presence - Report one presence cycle
//! - POST /exam/{id}/viewport - Report viewport lost / restored
//! - POST /exam/{id}/submit - Manual submit
//! - POST /exam/{id}/retry - Retry a failed submission
//! - WS /ws/{id} - Live session outputs
//!
//! Each hosted session sits behind its own lock. The session map is only
//! held long enough to clone a handle, so a slow delivery for one session
//! never stalls the others.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ExamConfig;
use crate::core::presence::PresenceReading;
use crate::core::receipt::save_receipt;
use crate::core::session::ExamSession;
use crate::core::transport::ExamTransport;
use crate::core::viewport::ViewportHost;
use crate::error::{ParseError, PresenceError, StartError, ViewportError};
use crate::types::{OptionLabel, Question, QuestionId, SessionOutput, SessionState, SessionSummary};

/// Viewport host backed by the browser: a fullscreen request is queued and
/// handed to the client with the next response.
#[derive(Debug, Default)]
pub struct BrowserViewport {
    requested: bool,
}

impl BrowserViewport {
    fn take_request(&mut self) -> bool {
        std::mem::take(&mut self.requested)
    }
}

impl ViewportHost for BrowserViewport {
    fn request_fullscreen(&mut self) -> Result<(), ViewportError> {
        self.requested = true;
        Ok(())
    }
}

/// One hosted exam session
#[derive(Debug)]
pub struct HostedSession {
    pub id: String,
    pub session: ExamSession,
    pub viewport: BrowserViewport,
    pub update_tx: broadcast::Sender<SessionOutput>,
}

pub type SessionHandle = Arc<Mutex<HostedSession>>;

/// App state
pub struct AppState {
    pub sessions: RwLock<HashMap<String, SessionHandle>>,
    pub transport: Arc<dyn ExamTransport>,
    pub config: ExamConfig,
    pub receipt_dir: Option<String>,
}

impl AppState {
    pub fn new(transport: Arc<dyn ExamTransport>, config: ExamConfig, receipt_dir: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            transport,
            config,
            receipt_dir,
        })
    }

    async fn session(&self, id: &str) -> Result<SessionHandle, ApiError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::session_not_found(id))
    }
}

// =============================================================================
// REQUESTS / RESPONSES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub candidate_name: String,
    pub roll_no: String,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: String,
    pub websocket_url: String,
    pub candidate_name: String,
    pub roll_no: String,
    pub set_name: String,
    pub questions: Vec<Question>,
    pub output: SessionOutput,
    pub fullscreen_requested: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session_id: String,
    pub output: SessionOutput,
    pub summary: SessionSummary,
    pub retry_available: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: QuestionId,
    pub option: String,
}

/// `faces` absent = model not loaded, no count this cycle
#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    pub faces: Option<usize>,
    #[serde(default = "default_frame_ready")]
    pub frame_ready: bool,
}

fn default_frame_ready() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ViewportRequest {
    pub lost: bool,
}

/// Outputs produced by one action, delivery included
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub outputs: Vec<SessionOutput>,
    pub fullscreen_requested: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_hosted: usize,
    pub sessions_active: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler failure: status + JSON message
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn session_not_found(id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("unknown session {}", id))
    }
}

impl From<StartError> for ApiError {
    fn from(e: StartError) -> Self {
        let status = match e {
            StartError::AlreadyCompleted => StatusCode::CONFLICT,
            StartError::NotFound(_) => StatusCode::NOT_FOUND,
            StartError::InvalidPaper(_) | StartError::ServerError(_) | StartError::NetworkError(_) => {
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/exam/start", post(start_exam))
        .route("/exam/:id", get(get_exam).delete(acknowledge))
        .route("/exam/:id/answer", post(answer))
        .route("/exam/:id/presence", post(presence))
        .route("/exam/:id/viewport", post(viewport))
        .route("/exam/:id/submit", post(submit))
        .route("/exam/:id/retry", post(retry))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint. Sessions locked by an in-flight action are not
/// counted as active.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    let sessions_active = sessions
        .values()
        .filter(|handle| {
            handle
                .try_lock()
                .map(|hosted| hosted.session.state() == SessionState::Active)
                .unwrap_or(false)
        })
        .count();

    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_hosted: sessions.len(),
        sessions_active,
    })
}

/// Verify the candidate and start the session
async fn start_exam(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let mut session = ExamSession::open(
        state.transport.as_ref(),
        req.candidate_name.trim(),
        req.roll_no.trim(),
        &state.config,
    )
    .await?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let mut viewport = BrowserViewport::default();
    let output = session.start(&mut viewport);
    let (tx, _) = broadcast::channel(100);

    let response = StartResponse {
        session_id: session_id.clone(),
        websocket_url: format!("/ws/{}", session_id),
        candidate_name: session.candidate().name.clone(),
        roll_no: session.candidate().roll_no.clone(),
        set_name: session.paper().set_name.clone(),
        questions: session.questions().to_vec(),
        output,
        fullscreen_requested: viewport.take_request(),
    };

    info!(session_id = %session_id, roll_no = %response.roll_no, "hosted session started");
    state.sessions.write().await.insert(
        session_id.clone(),
        Arc::new(Mutex::new(HostedSession {
            id: session_id,
            session,
            viewport,
            update_tx: tx,
        })),
    );
    Ok(Json(response))
}

/// Get session status
async fn get_exam(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let handle = state.session(&id).await?;
    let hosted = handle.lock().await;
    Ok(Json(status_response(id, &hosted.session)))
}

/// Host acknowledges the outcome: a submitted or terminally failed session
/// is discarded. Live sessions are refused.
async fn acknowledge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let handle = state.session(&id).await?;
    let response = {
        let hosted = handle.lock().await;
        if !hosted.session.is_terminal() {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                format!("session {} is {}, not finished", id, hosted.session.state()),
            ));
        }
        status_response(id.clone(), &hosted.session)
    };

    state.sessions.write().await.remove(&id);
    info!(session_id = %id, "session acknowledged and discarded");
    Ok(Json(response))
}

fn status_response(session_id: String, session: &ExamSession) -> StatusResponse {
    StatusResponse {
        session_id,
        output: session.status(),
        summary: session.summary(),
        retry_available: session.can_retry(),
        last_error: session.last_error().map(|e| e.to_string()),
    }
}

async fn answer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let option: OptionLabel = req
        .option
        .parse()
        .map_err(|e: ParseError| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
    act(&state, &id, |hosted| hosted.session.set_answer(req.question_id, option)).await
}

async fn presence(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PresenceRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let reading = match (req.frame_ready, req.faces) {
        (false, _) => PresenceReading::Unavailable(PresenceError::FrameUnavailable),
        (true, None) => PresenceReading::Unavailable(PresenceError::ModelUnavailable),
        (true, Some(n)) => PresenceReading::Faces(n),
    };
    act(&state, &id, |hosted| hosted.session.observe_presence(reading)).await
}

async fn viewport(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ViewportRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    act(&state, &id, |hosted| {
        if req.lost {
            hosted.session.viewport_lost(&mut hosted.viewport)
        } else {
            hosted.session.viewport_restored()
        }
    })
    .await
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    act(&state, &id, |hosted| hosted.session.request_submit()).await
}

async fn retry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    act(&state, &id, |hosted| hosted.session.retry()).await
}

/// Apply one action, deliver if the gate closed, broadcast every output.
/// Only this session's lock is held across the delivery.
async fn act<F>(state: &AppState, id: &str, action: F) -> Result<Json<ActionResponse>, ApiError>
where
    F: FnOnce(&mut HostedSession) -> SessionOutput,
{
    let handle = state.session(id).await?;
    let mut hosted = handle.lock().await;

    let mut outputs = vec![action(&mut *hosted)];
    if let Some(out) = deliver_pending(state.transport.as_ref(), state.receipt_dir.as_deref(), &mut hosted).await {
        outputs.push(out);
    }
    for out in &outputs {
        let _ = hosted.update_tx.send(out.clone());
    }

    Ok(Json(ActionResponse {
        outputs,
        fullscreen_requested: hosted.viewport.take_request(),
    }))
}

/// One transport attempt if a record is pending. Writes a receipt on success
/// when a receipt directory is configured.
async fn deliver_pending(
    transport: &dyn ExamTransport,
    receipt_dir: Option<&str>,
    hosted: &mut HostedSession,
) -> Option<SessionOutput> {
    if !hosted.session.pending_delivery() {
        return None;
    }
    let out = hosted.session.deliver(transport).await;

    if out.state == SessionState::Submitted {
        if let Some(dir) = receipt_dir {
            if let Err(e) = save_receipt(&hosted.session, dir) {
                warn!(session_id = %hosted.id, error = %e, "receipt not saved");
            }
        }
    }
    Some(out)
}

/// Per-session tick tasks started by one `tick_all` sweep
#[derive(Debug, Default)]
pub struct TickSweep {
    tasks: Vec<JoinHandle<bool>>,
}

impl TickSweep {
    /// Wait for every tick, and any delivery it started. Returns how many
    /// sessions were active and ticked.
    pub async fn settle(self) -> usize {
        let mut ticked = 0;
        for task in self.tasks {
            if let Ok(true) = task.await {
                ticked += 1;
            }
        }
        ticked
    }
}

/// Advance every hosted session by one clock period.
///
/// Each session is ticked on its own task, so a session whose lock is held
/// by a slow delivery does not hold up the rest.
pub async fn tick_all(state: &AppState) -> TickSweep {
    let handles: Vec<SessionHandle> = state.sessions.read().await.values().cloned().collect();
    let mut sweep = TickSweep::default();

    for handle in handles {
        let transport = Arc::clone(&state.transport);
        let receipt_dir = state.receipt_dir.clone();
        sweep.tasks.push(tokio::spawn(async move {
            let mut hosted = handle.lock().await;
            if hosted.session.state() != SessionState::Active {
                return false;
            }
            let out = hosted.session.tick();
            let _ = hosted.update_tx.send(out);
            if let Some(out) = deliver_pending(transport.as_ref(), receipt_dir.as_deref(), &mut hosted).await {
                let _ = hosted.update_tx.send(out);
            }
            true
        }));
    }
    sweep
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state.session(&id).await?;
    let rx = handle.lock().await.update_tx.subscribe();

    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, rx)))
}

/// Forward session outputs until either side goes away
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<SessionOutput>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(output) => {
                    let json = serde_json::to_string(&output).unwrap_or_default();
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "websocket client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Run the API server with a ticker advancing every active session
pub async fn run_server(
    addr: &str,
    transport: Arc<dyn ExamTransport>,
    config: ExamConfig,
    receipt_dir: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let tick_interval = config.tick_interval();
    let state = AppState::new(transport, config, receipt_dir);

    let ticker_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            tick_all(&ticker_state).await;
        }
    });

    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "exam host listening");
    println!("📝 examguard API running on {}", addr);
    println!("  POST /exam/start          - Verify candidate, start exam");
    println!("  GET  /exam/:id            - Status");
    println!("  DELETE /exam/:id          - Acknowledge finished session");
    println!("  POST /exam/:id/answer     - Pick an option");
    println!("  POST /exam/:id/presence   - Presence cycle");
    println!("  POST /exam/:id/viewport   - Viewport lost / restored");
    println!("  POST /exam/:id/submit     - Submit");
    println!("  POST /exam/:id/retry      - Retry failed submission");
    println!("  WS   /ws/:id              - Live updates");
    println!("  GET  /health              - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
