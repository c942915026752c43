//! The push side: a Server-Sent Events stream that polls a mailbox at
//! a fixed interval and relays events to the connected observer.
//!
//! Every delay lives inside the returned stream, so dropping it (the
//! observer disconnected) cancels all pending timers at once. The hub
//! registration is released by a guard on every exit path: terminal
//! event, session timeout, or disconnect.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::Event;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::time::Instant;

use super::{Mailbox, ProgressEvent, ProgressHub, ProgressKind};

/// Timing knobs for one push session.
#[derive(Debug, Clone)]
pub struct PushChannelConfig {
    /// How often the mailbox slot is checked.
    pub poll_interval: Duration,
    /// Delay between delivering a terminal event and closing.
    pub grace_delay: Duration,
    /// Delay between delivering the timeout notice and closing.
    pub close_delay: Duration,
    /// Maximum session duration without a terminal event.
    pub session_timeout: Duration,
}

impl Default for PushChannelConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            grace_delay: Duration::from_millis(500),
            close_delay: Duration::from_millis(100),
            session_timeout: Duration::from_secs(60),
        }
    }
}

/// Releases the hub registration when the session ends, however it
/// ends.
pub struct ChannelGuard {
    hub: Arc<ProgressHub>,
    token: String,
}

impl ChannelGuard {
    pub fn new(hub: Arc<ProgressHub>, token: impl Into<String>) -> Self {
        Self {
            hub,
            token: token.into(),
        }
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        tracing::debug!(token = %self.token, "Push channel closed");
        self.hub.release(&self.token);
    }
}

enum Phase {
    Connect,
    Poll,
    CloseAfterTerminal,
    CloseAfterTimeout,
}

struct PushSession {
    mailbox: Arc<Mailbox>,
    config: PushChannelConfig,
    deadline: Instant,
    phase: Phase,
    _guard: Option<ChannelGuard>,
}

/// Build the SSE event stream for one observer.
///
/// Each item's `data` field carries the wire envelope
/// `{"type": …, "data": {…}}`.
pub fn push_event_stream(
    mailbox: Arc<Mailbox>,
    config: PushChannelConfig,
    guard: Option<ChannelGuard>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    progress_event_stream(mailbox, config, guard)
        .map(|event| Ok(Event::default().data(event.wire_json().to_string())))
}

/// The typed event sequence behind [`push_event_stream`].
///
/// Emits a `connected` hello, then relays mailbox events as they are
/// polled. A terminal-class event closes the stream after the grace
/// delay; with no terminal event the stream emits `timeout` at the
/// session deadline and closes shortly after.
pub fn progress_event_stream(
    mailbox: Arc<Mailbox>,
    config: PushChannelConfig,
    guard: Option<ChannelGuard>,
) -> impl Stream<Item = ProgressEvent> {
    let deadline = Instant::now() + config.session_timeout;
    let session = PushSession {
        mailbox,
        config,
        deadline,
        phase: Phase::Connect,
        _guard: guard,
    };

    stream::unfold(session, |mut session| async move {
        loop {
            match session.phase {
                Phase::Connect => {
                    session.phase = Phase::Poll;
                    let hello =
                        ProgressEvent::new(ProgressKind::Connected, "Progress monitoring started");
                    return Some((hello, session));
                }
                Phase::Poll => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(session.deadline) => {
                            session.phase = Phase::CloseAfterTimeout;
                            let notice = ProgressEvent::new(
                                ProgressKind::Timeout,
                                "Progress stream timed out",
                            );
                            return Some((notice, session));
                        }
                        _ = tokio::time::sleep(session.config.poll_interval) => {
                            if let Some(event) = session.mailbox.take() {
                                if event.kind.is_terminal() {
                                    session.phase = Phase::CloseAfterTerminal;
                                }
                                return Some((event, session));
                            }
                        }
                    }
                }
                Phase::CloseAfterTerminal => {
                    tokio::time::sleep(session.config.grace_delay).await;
                    return None;
                }
                Phase::CloseAfterTimeout => {
                    tokio::time::sleep(session.config.close_delay).await;
                    return None;
                }
            }
        }
    })
}
