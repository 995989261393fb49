//! HTTP route handlers for the eco guide API.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info};

use crate::session::{SessionKey, build_prompt};
use crate::speech::AudioClip;

use super::error::{ApiError, panic_response};
use super::state::AppState;

/// Header carrying the caller's conversation id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Largest accepted request body (audio uploads).
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

const INDEX_HTML: &str = include_str!("../../static/index.html");

const NO_MESSAGE: &str = "No message provided";
const NO_DATA: &str = "No data received";
const NO_COMMAND: &str = "No command received";
const NO_AUDIO: &str = "No audio file provided";
const BAD_UPLOAD: &str = "Could not read audio upload";

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/send_message", post(send_message))
        .route("/process_command", post(process_command))
        .route("/process_audio", post(process_audio))
        .route("/reset", post(reset_session))
        .nest_service("/static", assets)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn session_key(headers: &HeaderMap) -> SessionKey {
    SessionKey::from_client(headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()))
}

/// Serve the chat UI. The page opens its own conversation through `/reset`.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint.
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "eco-guide",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model_name,
        "sessions": state.sessions.session_count(),
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds().max(0),
    }))
}

/// Reply to a text message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// The model's reply.
    pub response: String,
}

/// Reply to a spoken command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// Always `true` on success.
    pub success: bool,
    /// The model's reply.
    pub response: String,
}

/// Transcript and reply for an audio upload.
#[derive(Debug, Serialize)]
pub struct AudioResponse {
    /// What the user said.
    pub user_text: String,
    /// The model's reply.
    pub ai_response: String,
}

/// Greeting after a conversation reset.
#[derive(Debug, Serialize)]
pub struct ResetResponse {
    /// Opening line of the new conversation.
    pub greeting: String,
}

/// Extract a non-blank string field from a JSON object body.
fn required_field(
    body: &[u8],
    field: &str,
    missing_body: &'static str,
    missing_field: &'static str,
) -> Result<String, ApiError> {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
        return Err(ApiError::BadRequest(missing_body));
    };
    if map.is_empty() {
        return Err(ApiError::BadRequest(missing_body));
    }
    match map.get(field) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.clone()),
        _ => Err(ApiError::BadRequest(missing_field)),
    }
}

/// Template a typed message and send it through the caller's conversation.
async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let body = body?;
    let message = required_field(&body, "message", NO_MESSAGE, NO_MESSAGE)?;
    let key = session_key(&headers);
    info!(session = %key, chars = message.chars().count(), "Processing message");

    let response = state.sessions.respond(&key, &build_prompt(&message)).await?;
    Ok(Json(MessageResponse { response }))
}

/// Send a recognized voice command as-is; the persona comes from the preamble.
async fn process_command(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<CommandResponse>, ApiError> {
    let body = body?;
    let command = required_field(&body, "command", NO_DATA, NO_COMMAND)?;
    let key = session_key(&headers);
    info!(session = %key, chars = command.chars().count(), "Processing command");
    debug!(session = %key, command = %command, "Command text");

    let response = state.sessions.respond(&key, &command).await?;
    debug!(session = %key, response = %response, "Generated response");
    Ok(Json(CommandResponse {
        success: true,
        response,
    }))
}

/// Transcribe an uploaded recording, then answer it like a typed message.
async fn process_audio(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AudioResponse>, ApiError> {
    let mut multipart = multipart.map_err(|_| ApiError::BadRequest(NO_AUDIO))?;
    let clip = read_audio_field(&mut multipart)
        .await?
        .ok_or(ApiError::BadRequest(NO_AUDIO))?;

    let key = session_key(&headers);
    info!(session = %key, bytes = clip.bytes.len(), mime = %clip.mime_type, "Processing audio");

    let user_text = state.transcriber.transcribe(clip).await?;
    let ai_response = state.sessions.respond(&key, &build_prompt(&user_text)).await?;

    Ok(Json(AudioResponse {
        user_text,
        ai_response,
    }))
}

async fn read_audio_field(multipart: &mut Multipart) -> Result<Option<AudioClip>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| upload_error(&e))? {
        if field.name() != Some("audio") {
            continue;
        }
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| upload_error(&e))?;
        let clip = AudioClip::new(bytes.to_vec(), mime_type.as_deref());
        return Ok((!clip.is_empty()).then_some(clip));
    }
    Ok(None)
}

fn upload_error(err: &MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(BAD_UPLOAD)
    }
}

/// Start the caller's conversation afresh.
async fn reset_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiError> {
    let key = session_key(&headers);
    let greeting = state.sessions.initialize(&key).await?;
    Ok(Json(ResetResponse { greeting }))
}
