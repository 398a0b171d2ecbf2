use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::session::SessionId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Begin or resume the stage containing the requested node. Defaults to
/// the configured opening node when the body names none.
pub async fn start(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(req): Json<StartRequest>,
) -> ApiResult<Json<Value>> {
    let node_id = req
        .node_id
        .unwrap_or_else(|| state.config.dialogue.start_node.clone());

    let outcome = state.controller.start(&session_id, &node_id).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(|e| {
        ApiError::Internal(format!("failed to encode response: {}", e))
    })?))
}

#[derive(Debug, Deserialize)]
pub struct CounselorTurnRequest {
    #[serde(default)]
    pub dialogue: String,
}

pub async fn counselor_turn(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(req): Json<CounselorTurnRequest>,
) -> ApiResult<Json<Value>> {
    let dialogue = req.dialogue.trim();
    if dialogue.is_empty() {
        return Err(ApiError::BadRequest("dialogue must not be empty".to_string()));
    }

    let turn = state.controller.counselor_turn(&session_id, dialogue).await?;
    Ok(Json(serde_json::to_value(turn).map_err(|e| {
        ApiError::Internal(format!("failed to encode response: {}", e))
    })?))
}

pub async fn generate_client_response(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> ApiResult<Json<Value>> {
    let client = state.client_for(&session_id).await?;
    let turn = state
        .controller
        .generate_client_turn(&session_id, client.as_ref())
        .await?;
    Ok(Json(serde_json::to_value(turn).map_err(|e| {
        ApiError::Internal(format!("failed to encode response: {}", e))
    })?))
}

#[derive(Debug, Deserialize)]
pub struct CustomQuestionRequest {
    #[serde(default)]
    pub question: String,
}

pub async fn ask_client_custom_question(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(req): Json<CustomQuestionRequest>,
) -> ApiResult<Json<Value>> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let client = state.client_for(&session_id).await?;
    let answer = state
        .controller
        .ask_custom_question(&session_id, question, client.as_ref())
        .await?;
    Ok(Json(serde_json::to_value(answer).map_err(|e| {
        ApiError::Internal(format!("failed to encode response: {}", e))
    })?))
}
