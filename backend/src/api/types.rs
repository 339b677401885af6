//! Request and response bodies of the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use uuid::Uuid;

use crate::error::{PipelineError, ServerError};
use crate::pipeline::ImportReport;
use crate::upload::{UploadProgress, UploadReport};

/// Returned by `POST /api/upload/{kind}` once the session has started.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAccepted {
    pub session_id: Uuid,
    /// Where to poll for progress.
    pub status_url: String,
}

impl UploadAccepted {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            status_url: format!("/api/sessions/{}", session_id),
        }
    }
}

/// Import counts without the records, kept alongside a running session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub rows_parsed: usize,
    pub valid: usize,
    pub invalid: usize,
    pub warnings: usize,
}

impl From<&ImportReport> for ImportSummary {
    fn from(report: &ImportReport) -> Self {
        Self {
            rows_parsed: report.rows_parsed,
            valid: report.valid,
            invalid: report.invalid,
            warnings: report.warnings.len(),
        }
    }
}

/// `GET /api/sessions/{id}` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub progress: UploadProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<UploadReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set once the run has ended; drives eviction.
    #[serde(skip)]
    pub finished_at: Option<Instant>,
}

impl SessionView {
    pub fn new(session_id: Uuid, progress: UploadProgress) -> Self {
        Self {
            session_id,
            progress,
            import: None,
            report: None,
            error: None,
            finished_at: None,
        }
    }
}

/// Error body shared by every endpoint.
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Pipeline(e) => match e {
                PipelineError::Parse(_) | PipelineError::Translate(_) => StatusCode::BAD_REQUEST,
                PipelineError::NoValidRecords { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Client(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(error_response(&self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServerError::BadRequest("no file".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        let parse: ServerError = PipelineError::from(ParseError::new(0, "Empty CSV file")).into();
        assert_eq!(parse.status_code(), StatusCode::BAD_REQUEST);
        let empty: ServerError = PipelineError::NoValidRecords { attempted: 4 }.into();
        assert_eq!(empty.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_upload_accepted_json() {
        let id = Uuid::nil();
        let body = serde_json::to_value(UploadAccepted::new(id)).unwrap();
        assert_eq!(body["sessionId"], id.to_string());
        assert_eq!(
            body["statusUrl"],
            "/api/sessions/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_session_view_omits_empty_parts() {
        let view = SessionView::new(Uuid::nil(), UploadProgress::default());
        let body = serde_json::to_value(view).unwrap();
        assert!(body.get("report").is_none());
        assert_eq!(body["progress"]["status"]["state"], "idle");
    }
}
