//! HTTP route handlers for the chat API.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::controller::SendOutcome;
use crate::chat::core::config::{ModelKind, ResponseConfig};
use crate::chat::core::errors::ChatError;
use crate::chat::core::ids::{MessageId, SessionId};
use crate::chat::core::message::{Message, file_block};
use crate::chat::core::session::Session;
use crate::voice::Voice;

use super::state::AppState;

type ApiError = (StatusCode, String);

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chats", get(list_chats).post(new_chat))
        .route("/api/chats/{id}", delete(delete_chat))
        .route("/api/chats/{id}/select", post(select_chat))
        .route("/api/messages", get(messages))
        .route("/api/messages/{id}/speak", post(speak_message))
        .route("/api/send", post(send_message))
        .route("/api/config", get(get_config).put(put_config))
        .route("/api/voices", get(list_voices))
        .route("/api/voices/preview", post(preview_voice))
        .route("/api/speech/stop", post(stop_speaking))
        .with_state(state)
}

fn error_response(err: &ChatError) -> ApiError {
    let status = match err {
        ChatError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        ChatError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, format!("invalid {what} id: {raw}")))
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "lumina-chat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Session list entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Session id.
    pub id: SessionId,
    /// Session title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Number of messages.
    pub message_count: usize,
    /// Whether this is the active session.
    pub active: bool,
}

impl SessionSummary {
    fn new(session: &Session, active: Option<SessionId>) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            created_at: session.created_at,
            message_count: session.messages.len(),
            active: active == Some(session.id),
        }
    }
}

async fn list_chats(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummary>> {
    let active = state.controller.active_session();
    let summaries = state
        .controller
        .sessions()
        .iter()
        .map(|session| SessionSummary::new(session, active))
        .collect();
    Json(summaries)
}

async fn new_chat(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.new_chat();
    StatusCode::NO_CONTENT
}

async fn select_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let id: SessionId = parse_id(&id, "session")?;
    if !state.controller.select_chat(id) {
        return Err((StatusCode::NOT_FOUND, format!("unknown session {id}")));
    }
    Ok(Json(TranscriptResponse::current(&state)))
}

async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: SessionId = parse_id(&id, "session")?;
    if state.controller.delete_chat(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("unknown session {id}")))
    }
}

/// Active transcript.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptResponse {
    /// Active session id, if any.
    pub session_id: Option<SessionId>,
    /// Messages, oldest first.
    pub messages: Vec<Message>,
    /// Whether an exchange is in flight.
    pub busy: bool,
}

impl TranscriptResponse {
    fn current(state: &AppState) -> Self {
        Self {
            session_id: state.controller.active_session(),
            messages: state.controller.messages(),
            busy: state.controller.is_busy(),
        }
    }
}

async fn messages(State(state): State<Arc<AppState>>) -> Json<TranscriptResponse> {
    Json(TranscriptResponse::current(&state))
}

async fn speak_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: MessageId = parse_id(&id, "message")?;
    match state.controller.speak_message(id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT),
        Ok(false) => Err((StatusCode::NOT_FOUND, format!("unknown message {id}"))),
        Err(e) => Err(error_response(&e)),
    }
}

async fn stop_speaking(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state
        .controller
        .stop_speaking()
        .await
        .map_err(|e| error_response(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Text file attached to a send request.
#[derive(Debug, Deserialize)]
pub struct FileAttachment {
    /// File name shown in the prompt.
    pub name: String,
    /// File contents.
    pub content: String,
}

/// Send request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    /// User text; may be empty when an image is attached.
    #[serde(default)]
    pub text: String,
    /// Attached image as a data URI.
    pub image: Option<String>,
    /// Model short name or id; keeps the current model when absent.
    pub model: Option<String>,
    /// Web-search grounding toggle; keeps the current setting when absent.
    pub enable_search: Option<bool>,
    /// Text files appended to the prompt as fenced blocks.
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

/// Send response.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    /// Exchange outcome.
    pub outcome: SendOutcome,
    /// Transcript after the exchange.
    #[serde(flatten)]
    pub transcript: TranscriptResponse,
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    if let Some(name) = request.model.as_deref() {
        let model = ModelKind::parse(name)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("unknown model: {name}")))?;
        state.controller.set_model(model);
    }
    if let Some(enabled) = request.enable_search {
        state.controller.set_search(enabled);
    }

    let mut text = request.text;
    for file in &request.files {
        text.push_str(&file_block(&file.name, &file.content));
    }

    // The exchange outlives a dropped connection.
    let exchange_state = Arc::clone(&state);
    let image = request.image;
    let outcome = tokio::spawn(async move { exchange_state.controller.send(&text, image).await })
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("exchange task failed: {e}"),
            )
        })?;
    Ok(Json(SendResponse {
        outcome,
        transcript: TranscriptResponse::current(&state),
    }))
}

/// Settings view.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    /// Response settings.
    pub config: ResponseConfig,
    /// Selected model short name.
    pub model: &'static str,
    /// Selected model display name.
    pub model_name: &'static str,
    /// Web-search grounding toggle.
    pub enable_search: bool,
}

async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let model = state.controller.model();
    Json(ConfigResponse {
        config: state.controller.config(),
        model: model.short_name(),
        model_name: model.display_name(),
        enable_search: state.controller.search_enabled(),
    })
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(config): Json<ResponseConfig>,
) -> Result<Json<ResponseConfig>, ApiError> {
    state
        .controller
        .update_config(config)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(Json(state.controller.config()))
}

async fn list_voices(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Voice>>, ApiError> {
    state
        .speech
        .list_voices()
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

/// Voice preview request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Voice to sample; empty selects the host default.
    #[serde(default)]
    pub voice_id: String,
}

async fn preview_voice(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PreviewRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .controller
        .preview_voice(&request.voice_id)
        .await
        .map_err(|e| error_response(&e))?;
    Ok(StatusCode::NO_CONTENT)
}
