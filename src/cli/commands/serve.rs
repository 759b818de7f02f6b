//! HTTP API server for the study web client.
//!
//! Provides plan generation as a streamed log, document upload with text
//! extraction, and read access to stored sessions.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::documents;
use crate::error::StudyError;
use crate::materials::MaterialStore;
use crate::memory::{AgentOutputRecord, SessionContext, SessionMemory};
use crate::orchestrator::{Orchestrator, StudyRequest};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state.
struct AppState {
    orchestrator: Arc<Orchestrator>,
    materials: MaterialStore,
    memory_root: PathBuf,
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Serve, &settings)?;

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let materials = MaterialStore::new(settings.materials_dir())?;
    let memory_root = settings.memory_dir();
    let orchestrator = Arc::new(Orchestrator::new(settings)?);

    let state = Arc::new(AppState {
        orchestrator,
        materials,
        memory_root,
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    Output::header("studycrew API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Generate plan", "POST /generate-plan");
    Output::kv("Upload", "POST /upload");
    Output::kv("Session", "GET  /sessions/{id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/generate-plan", post(generate_plan))
        .route("/upload", post(upload))
        .route("/sessions/{id}", get(get_session))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// === Response Types ===

#[derive(Serialize)]
struct UploadResponse {
    text: String,
    filename: String,
    saved_path: String,
}

#[derive(Serialize)]
struct UploadError {
    error: String,
    text: String,
}

#[derive(Serialize)]
struct SessionResponse {
    summary: String,
    context: SessionContext,
    outputs: Vec<AgentOutputRecord>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Stream the run's log as plain text, one line per relay message.
async fn generate_plan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StudyRequest>,
) -> Response {
    info!("Plan requested for '{}'", req.topic);
    let lines = state
        .orchestrator
        .start(req)
        .into_stream()
        .map(|line| Ok::<_, Infallible>(format!("{}\n", line)));

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(lines),
    )
        .into_response()
}

async fn upload(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    match receive_upload(&state, multipart).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            warn!("Upload failed: {}", e);
            Json(UploadError {
                error: format!("Failed to process file: {}", e),
                text: String::new(),
            })
            .into_response()
        }
    }
}

async fn receive_upload(state: &AppState, mut multipart: Multipart) -> anyhow::Result<UploadResponse> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload.txt").to_string();
        let bytes = field.bytes().await?;

        let saved = state.materials.write_bytes(&filename.to_lowercase(), &bytes)?;
        info!("Stored upload {} ({} bytes)", saved.display(), bytes.len());

        let name = filename.clone();
        let text = tokio::task::spawn_blocking(move || documents::extract_text(&name, &bytes)).await?;

        return Ok(UploadResponse {
            text,
            filename,
            saved_path: saved.display().to_string(),
        });
    }

    anyhow::bail!("missing multipart field 'file'")
}

async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match SessionMemory::open_existing(&state.memory_root, &id) {
        Ok(memory) => Json(SessionResponse {
            summary: memory.context_summary(),
            context: memory.context().clone(),
            outputs: memory.agent_outputs(None).into_iter().cloned().collect(),
        })
        .into_response(),
        Err(e) => {
            let status = match e {
                StudyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                StudyError::Memory(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, Json(ErrorResponse { error: e.to_string() })).into_response()
        }
    }
}
