//! HTTP server for the paybatch API.
//!
//! # API Endpoints
//!
//! | Method | Path                   | Description                                  |
//! |--------|------------------------|----------------------------------------------|
//! | GET    | `/health`              | Health check                                 |
//! | POST   | `/api/import/{kind}`   | Parse and validate a CSV, return the report  |
//! | POST   | `/api/upload/{kind}`   | Import and submit in chunks (background)     |
//! | GET    | `/api/sessions/{id}`   | Progress and outcome of an upload session    |
//! | GET    | `/api/logs`            | SSE stream for real-time logs                |
//!
//! Upload bodies are multipart with a `file` field and an optional `mode`
//! field (`create` or `update`); `?mode=` in the query works too.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    convert::Infallible,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{ImportSummary, SessionView, UploadAccepted};
use crate::client::ApiClient;
use crate::config::{Config, MAX_UPLOAD_SIZE, SESSION_TTL};
use crate::error::{ConfigError, PipelineError, ServerError};
use crate::models::{RecordKind, WriteMode};
use crate::pipeline::{import_bytes, load_locations, upload_into, ImportOptions, ImportReport};
use crate::translate::LocationCodeMap;
use crate::upload::{Orchestrator, UploadProgress, UploadSession, UploadStatus};

type Sessions = Arc<RwLock<HashMap<Uuid, SessionView>>>;

/// Shared between handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    client: Option<ApiClient>,
    /// Fixed directory snapshot; otherwise fetched per request.
    locations: Option<Arc<LocationCodeMap>>,
    sessions: Sessions,
}

impl AppState {
    pub fn new(config: Config, locations: Option<LocationCodeMap>) -> Self {
        let client = ApiClient::from_config(&config).ok();
        Self {
            config: Arc::new(config),
            client,
            locations: locations.map(Arc::new),
            sessions: Arc::default(),
        }
    }

    fn client(&self) -> Result<&ApiClient, ServerError> {
        self.client
            .as_ref()
            .ok_or_else(|| PipelineError::from(ConfigError::Missing(crate::config::ENV_API_URL)).into())
    }

    async fn locations(&self) -> Result<Arc<LocationCodeMap>, ServerError> {
        if let Some(map) = &self.locations {
            return Ok(Arc::clone(map));
        }
        let map = load_locations(self.client()?).await?;
        Ok(Arc::new(map))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/import/{kind}", post(import_csv))
        .route("/api/upload/{kind}", post(upload_csv))
        .route("/api/sessions/{id}", get(session_status))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Paybatch server running on http://localhost:{}", port);
    println!("   POST /api/import/{{kind}}  - Validate a CSV file");
    println!("   POST /api/upload/{{kind}}  - Validate and submit a CSV file");
    println!("   GET  /api/sessions/{{id}}  - Upload progress");
    println!("   GET  /api/logs            - SSE log stream");
    println!("   GET  /health              - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "paybatch",
        "version": env!("CARGO_PKG_VERSION"),
        "kinds": ["employee", "nic-tax", "timesheet"],
    }))
}

async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(LOG_BROADCASTER.subscribe()).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[derive(Debug, Default, Deserialize)]
struct UploadQuery {
    mode: Option<String>,
    delimiter: Option<char>,
}

struct UploadForm {
    bytes: Vec<u8>,
    file_name: Option<String>,
    mode: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ServerError> {
    let mut bytes = None;
    let mut file_name = None;
    let mut mode = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                bytes = Some(data.to_vec());
            }
            "mode" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                mode = Some(text);
            }
            _ => {}
        }
    }

    let bytes = bytes.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    Ok(UploadForm {
        bytes,
        file_name,
        mode,
    })
}

fn import_options(kind: &str, query: &UploadQuery, form: &UploadForm) -> Result<ImportOptions, ServerError> {
    let kind: RecordKind = kind.parse().map_err(ServerError::NotFound)?;
    let mode = match form.mode.as_deref().or(query.mode.as_deref()) {
        Some(raw) => raw.parse::<WriteMode>().map_err(ServerError::BadRequest)?,
        None => WriteMode::default(),
    };
    Ok(ImportOptions::new(kind)
        .with_mode(mode)
        .with_delimiter(query.delimiter))
}

fn announce(form: &UploadForm, options: &ImportOptions) {
    log_info(format!(
        "New {} upload: {} ({} bytes, {})",
        options.kind,
        form.file_name.as_deref().unwrap_or("unknown"),
        form.bytes.len(),
        options.mode
    ));
}

async fn import_csv(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<ImportReport>, ServerError> {
    let form = read_form(multipart).await?;
    let options = import_options(&kind, &query, &form)?
        .with_batch_size(state.config.parse_batch_size);
    announce(&form, &options);

    let locations = state.locations().await?;
    let report = import_bytes(form.bytes, &options, &locations).await?;
    Ok(Json(report))
}

async fn upload_csv(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadAccepted>), ServerError> {
    let form = read_form(multipart).await?;
    let options = import_options(&kind, &query, &form)?
        .with_batch_size(state.config.parse_batch_size);
    announce(&form, &options);

    let client = state.client()?.clone();
    let locations = state.locations().await?;
    let chunk_size = state.config.chunk_size_for(options.kind, options.mode);
    let mut session = UploadSession::new(options.kind, options.mode, chunk_size)
        .map_err(PipelineError::from)?;
    let id = session.id();

    let parsing = UploadProgress {
        status: UploadStatus::Parsing,
        ..UploadProgress::default()
    };
    {
        let mut sessions = state.sessions.write().await;
        prune_sessions(&mut sessions, Instant::now());
        sessions.insert(id, SessionView::new(id, parsing));
    }

    let orchestrator = Orchestrator::new(client).with_retry(state.config.retry_policy());
    tokio::spawn(track_progress(
        state.sessions.clone(),
        id,
        orchestrator.subscribe(),
    ));

    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let result =
            upload_into(&mut session, form.bytes, &options, &locations, &orchestrator).await;

        let mut sessions = sessions.write().await;
        let view = sessions
            .entry(id)
            .or_insert_with(|| SessionView::new(id, session.progress()));
        view.progress = session.progress();
        view.finished_at = Some(Instant::now());
        match result {
            Ok((import, report)) => {
                view.import = Some(ImportSummary::from(&import));
                view.report = Some(report);
            }
            Err(e) => {
                log_error(format!("Upload {} failed: {}", id, e));
                if !session.status().is_terminal() {
                    view.progress.status = UploadStatus::Failed;
                }
                view.error = Some(e.to_string());
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(UploadAccepted::new(id))))
}

/// Drop sessions that finished more than [`SESSION_TTL`] ago.
fn prune_sessions(sessions: &mut HashMap<Uuid, SessionView>, now: Instant) {
    sessions.retain(|_, view| {
        view.finished_at
            .map_or(true, |at| now.saturating_duration_since(at) < SESSION_TTL)
    });
}

/// Mirror published progress into the session table until the run ends.
async fn track_progress(
    sessions: Sessions,
    id: Uuid,
    mut rx: tokio::sync::watch::Receiver<UploadProgress>,
) {
    while rx.changed().await.is_ok() {
        let progress = rx.borrow_and_update().clone();
        if let Some(view) = sessions.write().await.get_mut(&id) {
            view.progress = progress;
        }
    }
}

async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ServerError> {
    state
        .sessions
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("session {}", id)))
}
