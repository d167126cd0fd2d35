//! Chat routes.
//!
//! - `POST /chat`: `{response, context_used}`
//! - `POST /chat/stream`: SSE: one metadata event, then answer fragments

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::sse::{Event as SseEvent, KeepAlive, KeepAliveStream, Sse},
    routing::post,
};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use payassist_core::AuthError;
use payassist_pipeline::{ChatReply, ChatRequest};
use serde_json::json;
use tracing::{info, warn};

use crate::SharedState;
use crate::auth::resolve_identity;
use crate::error::ApiError;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
}

fn check_query(request: &ChatRequest) -> Result<(), ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("Query must not be empty"));
    }
    Ok(())
}

async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    check_query(&request)?;
    info!(intent = ?request.intent, "chat request");

    let identity = resolve_identity(&state, &headers).await?;
    let reply = state.pipeline.chat(&request, identity.as_ref()).await?;
    Ok(Json(reply))
}

/// SSE data can't carry bare carriage returns.
fn data_event(data: String) -> Result<SseEvent, Infallible> {
    Ok(SseEvent::default().data(data.replace('\r', "")))
}

fn error_stream(err: AuthError) -> BoxStream<'static, Result<SseEvent, Infallible>> {
    warn!(error = %err, "chat stream rejected");
    let detail = ApiError::from(err).detail;
    stream::once(async move { data_event(json!({"error": detail}).to_string()) }).boxed()
}

async fn chat_stream_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<KeepAliveStream<BoxStream<'static, Result<SseEvent, Infallible>>>>, ApiError> {
    check_query(&request)?;
    info!(intent = ?request.intent, "chat stream request");

    let events = match resolve_identity(&state, &headers).await {
        Err(e) => error_stream(e),
        Ok(identity) => match state.pipeline.chat_stream(&request, identity.as_ref()).await {
            Err(e) => error_stream(e),
            Ok((prepared, fragments)) => {
                let metadata = json!({
                    "type": "metadata",
                    "intent": prepared.intent.as_str(),
                    "context_used": prepared.context_used(),
                });
                stream::once(async move { data_event(metadata.to_string()) })
                    .chain(fragments.map(data_event))
                    .boxed()
            }
        },
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
