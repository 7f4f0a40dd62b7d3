//! SSE streaming chat endpoint.
//!
//! POST /api/chat
//!
//! Binds the request to a conversation session and streams the generated
//! response as Server-Sent Events. Each frame is a JSON object with
//! optional keys:
//! - `token` -- incremental text (with `continuing: true`)
//! - `title` -- assigned after the first completed exchange
//! - `error` -- failure reason (with `continuing: false`)
//! - `continuing` -- `false` only on the terminal frame, always last

use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;

use murmur_core::chat::controller::stream_exchange;
use murmur_types::chat::Frame;

use crate::http::handlers::owner_from_headers;
use crate::state::AppState;

/// Request body for the chat endpoint.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// The user message; missing or empty yields a terminal error frame.
    #[serde(default)]
    pub message: String,
    /// Conversation to continue; a fresh id is minted when absent.
    pub conversation_id: Option<String>,
}

/// POST /api/chat -- SSE streaming chat.
pub async fn chat_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner_id = owner_from_headers(&headers);
    let conversation_id = body
        .conversation_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let frames: Pin<Box<dyn Stream<Item = Frame> + Send>> =
        if body.message.trim().is_empty() {
            // Rejected before touching the registry; generation never runs.
            Box::pin(futures_util::stream::once(async {
                Frame::error("message is required")
            }))
        } else {
            let session = state
                .registry
                .get_or_load(
                    state.store.as_ref(),
                    &owner_id,
                    &conversation_id,
                    state.config.chat.max_pairs,
                    &state.config.chat.system_prompt,
                )
                .await;

            tracing::info!(
                owner_id,
                conversation_id,
                "starting streaming exchange"
            );

            Box::pin(stream_exchange(
                session,
                state.store.clone(),
                state.engine.clone(),
                state.augmenter.clone(),
                state.config.generation.clone(),
                body.message,
            ))
        };

    let events = frames.map(|frame| {
        Ok(Event::default().data(serde_json::to_string(&frame).unwrap_or_default()))
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
