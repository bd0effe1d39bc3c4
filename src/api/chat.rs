use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{self, StreamExt};

use crate::error::{Error, Result};
use crate::models::ChatRequest;
use crate::state::AppState;

/// POST /api/chat - conversational recommendations. Streams SSE frames
/// `{type: start|content|done|error}` unless `stream` is false.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload?;
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err(Error::Validation("No query provided".to_string()));
    }

    let permit = state
        .chat_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| Error::Generation("Chat service at capacity".to_string()))?;

    if !req.stream {
        let response = state.chat.respond(&query, &req.history).await;
        drop(permit);
        return Ok(Json(serde_json::json!({ "success": true, "response": response })).into_response());
    }

    let rx = state.chat.stream(query, req.history);

    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let frame = Event::default().json_data(&event).unwrap_or_else(|e| {
            tracing::error!("Failed to encode chat event: {e}");
            Event::default().data(r#"{"type":"error","message":"encoding failed"}"#)
        });
        Some((Ok::<_, Infallible>(frame), rx))
    });

    // Hold the permit for the lifetime of the stream
    let events = events.map(move |event| {
        let _permit = &permit;
        event
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()).into_response())
}
