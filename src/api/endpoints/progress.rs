//! Progress push endpoint: a long-lived SSE stream of lifecycle
//! events.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use futures_util::Stream;
use serde::Deserialize;

use crate::api::types::ApiContext;
use crate::progress::{push_event_stream, ChannelGuard, DEFAULT_CHANNEL};

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    /// Progress channel token matching the one sent with the chat
    /// request. Observers that omit it share the default slot.
    #[serde(default)]
    pub session: Option<String>,
}

/// `GET /api/html-progress` — subscribe to generation lifecycle
/// events. The channel closes itself shortly after a terminal event,
/// or at the session timeout with a `timeout` notice.
pub async fn stream(
    State(ctx): State<ApiContext>,
    Query(query): Query<ProgressQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let token = query
        .session
        .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
    tracing::debug!(token = %token, "Progress observer connected");

    let mailbox = ctx.progress.channel(&token);
    let guard = ChannelGuard::new(ctx.progress.clone(), token);
    Sse::new(push_event_stream(
        mailbox,
        ctx.push_config.clone(),
        Some(guard),
    ))
}
