use axum::extract::{Extension, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;

use consim_dialogue::{DialogueStreamEvent, StreamStart};

use crate::error::ApiResult;
use crate::session::SessionId;
use crate::state::AppState;

/// Generate the client reply and stream it as Server-Sent Events.
///
/// Frames are the controller's `{type: start|chunk|complete|error}` events
/// serialized as SSE data. Preconditions (no active dialogue, missing key)
/// fail as plain JSON errors before the stream opens; once the stream is
/// open, provider failures arrive as an `error` frame. A pointer already
/// past the script produces a single `complete` frame with the terminal
/// node info and no provider call.
pub async fn generate_client_response_stream(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let client = state.client_for(&session_id).await?;
    let start = state
        .controller
        .generate_client_turn_stream(&session_id, client)
        .await?;

    let event_stream: std::pin::Pin<Box<dyn Stream<Item = DialogueStreamEvent> + Send>> =
        match start {
            StreamStart::Stream(stream) => stream,
            StreamStart::Ended { node_info } => {
                Box::pin(futures::stream::iter([DialogueStreamEvent::Complete {
                    full_text: String::new(),
                    node_info,
                }]))
            }
        };

    let sse_stream = event_stream.map(|frame| {
        let event = Event::default().json_data(&frame).unwrap_or_else(|e| {
            tracing::error!("failed to encode stream frame: {}", e);
            Event::default().data("{\"type\":\"error\",\"message\":\"encoding failure\"}")
        });
        Ok::<Event, Infallible>(event)
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}
