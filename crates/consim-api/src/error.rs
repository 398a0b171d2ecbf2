use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use consim_dialogue::DialogueError;
use consim_llm::GenError;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("dialogue node not found: {0}")]
    NodeNotFound(String),

    #[error("no active dialogue for this session")]
    NoActiveDialogue,

    #[error(transparent)]
    Generation(#[from] GenError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DialogueError> for ApiError {
    fn from(err: DialogueError) -> Self {
        match err {
            DialogueError::NoActiveDialogue => ApiError::NoActiveDialogue,
            DialogueError::UnknownNode(id) => ApiError::NodeNotFound(id),
            DialogueError::NotClientNode(id) => {
                ApiError::BadRequest(format!("node {} cannot produce a client reply", id))
            }
            DialogueError::Generation(e) => ApiError::Generation(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::NoActiveDialogue => StatusCode::BAD_REQUEST,
            ApiError::NodeNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Generation(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            // Generation failures tell the UI whether prompting for a new
            // key could help.
            ApiError::Generation(e) => json!({
                "error": e.to_string(),
                "need_api_key": e.need_api_key(),
            }),
            other => json!({ "error": other.to_string() }),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }

        (status, Json(body)).into_response()
    }
}
