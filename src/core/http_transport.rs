//! HTTP transport against the exam backend
//!
//! - POST `examAssignment/conductExam?candidateName=..&examRollNo=..`
//! - POST `examAssignment/submitExam?examRollNo=..` with the answers object
//!
//! Every request carries `deviceType: Web`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ExamConfig;
use crate::core::transport::{ExamStart, ExamTransport};
use crate::error::{StartError, TransportError};
use crate::types::AnswerSnapshot;

const CONDUCT_EXAM_PATH: &str = "examAssignment/conductExam";
const SUBMIT_EXAM_PATH: &str = "examAssignment/submitExam";
const ALREADY_COMPLETED_MARKER: &str = "already completed the exam";

/// Backend error body: `{"message": ..}` or `{"error": ..}`
#[derive(Debug, Default, Deserialize)]
struct BackendMessage {
    message: Option<String>,
    error: Option<String>,
}

impl BackendMessage {
    fn parse(body: &str) -> Option<String> {
        let parsed: BackendMessage = serde_json::from_str(body).ok()?;
        parsed.message.or(parsed.error)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("devicetype"), HeaderValue::from_static("Web"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ExamConfig) -> Result<Self, TransportError> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl ExamTransport for HttpTransport {
    async fn start_exam(&self, candidate_name: &str, roll_no: &str) -> Result<ExamStart, StartError> {
        debug!(roll_no, "conductExam");
        let response = self
            .client
            .post(self.url(CONDUCT_EXAM_PATH))
            .query(&[("candidateName", candidate_name), ("examRollNo", roll_no)])
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| StartError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| StartError::NetworkError(e.to_string()))?;

        classify_start(status, roll_no, &body)
    }

    async fn submit_exam(&self, roll_no: &str, answers: &AnswerSnapshot) -> Result<(), TransportError> {
        debug!(roll_no, answers = answers.len(), "submitExam");
        let response = self
            .client
            .post(self.url(SUBMIT_EXAM_PATH))
            .query(&[("examRollNo", roll_no)])
            .json(&answers.to_wire())
            .send()
            .await
            .map_err(|e| TransportError::network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let error = classify_submit(status, &body);
        warn!(%status, error = %error, "submitExam failed");
        Err(error)
    }
}

/// Map a `conductExam` response to the paper or a start failure.
/// The backend may answer 200 with an "already completed" message.
fn classify_start(status: StatusCode, roll_no: &str, body: &str) -> Result<ExamStart, StartError> {
    let message = BackendMessage::parse(body);
    if message
        .as_deref()
        .map(|m| m.contains(ALREADY_COMPLETED_MARKER))
        .unwrap_or(false)
    {
        return Err(StartError::AlreadyCompleted);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(StartError::NotFound(roll_no.to_string()));
    }
    if !status.is_success() {
        return Err(StartError::ServerError(
            message.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        ));
    }

    serde_json::from_str(body)
        .map_err(|e| StartError::ServerError(format!("malformed paper: {}", e)))
}

/// Map a failed `submitExam` status to a transport error
fn classify_submit(status: StatusCode, body: &str) -> TransportError {
    let message = BackendMessage::parse(body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    if status.is_server_error() {
        TransportError::ServerError {
            status: status.as_u16(),
            message,
        }
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS {
        TransportError::network(message)
    } else {
        TransportError::Rejected(message)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::demo_paper;

    #[test]
    fn test_already_completed_on_success_status() {
        let body = r#"{"message":"You have already completed the exam. Multiple attempts are not allowed"}"#;
        assert_eq!(
            classify_start(StatusCode::OK, "R-1", body).unwrap_err(),
            StartError::AlreadyCompleted
        );
    }

    #[test]
    fn test_already_completed_on_error_status() {
        let body = r#"{"error":"Candidate has already completed the exam"}"#;
        assert_eq!(
            classify_start(StatusCode::BAD_REQUEST, "R-1", body).unwrap_err(),
            StartError::AlreadyCompleted
        );
    }

    #[test]
    fn test_start_status_mapping() {
        assert_eq!(
            classify_start(StatusCode::NOT_FOUND, "R-9", "").unwrap_err(),
            StartError::NotFound("R-9".to_string())
        );
        assert_eq!(
            classify_start(StatusCode::INTERNAL_SERVER_ERROR, "R-9", r#"{"message":"db down"}"#).unwrap_err(),
            StartError::ServerError("db down".to_string())
        );
        assert!(matches!(
            classify_start(StatusCode::OK, "R-9", "not json").unwrap_err(),
            StartError::ServerError(_)
        ));
    }

    #[test]
    fn test_start_parses_paper() {
        let body = serde_json::to_string(&demo_paper("Asha", "R-1")).unwrap();
        let start = classify_start(StatusCode::OK, "R-1", &body).unwrap();
        assert_eq!(start.questions.len(), 5);
    }

    #[test]
    fn test_submit_status_mapping() {
        assert!(matches!(
            classify_submit(StatusCode::BAD_GATEWAY, ""),
            TransportError::ServerError { status: 502, .. }
        ));
        assert!(classify_submit(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
        let rejected = classify_submit(StatusCode::CONFLICT, r#"{"message":"already submitted"}"#);
        assert_eq!(rejected, TransportError::Rejected("already submitted".to_string()));
    }

    #[test]
    fn test_base_url_normalized() {
        let transport = HttpTransport::new("http://localhost:8068/", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.url(SUBMIT_EXAM_PATH), "http://localhost:8068/examAssignment/submitExam");
    }
}
