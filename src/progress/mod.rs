//! Lifecycle progress events, the single-slot mailbox, and the
//! session-keyed hub.
//!
//! A mailbox holds at most one unread event: every write overwrites
//! whatever is there, read or not (last write wins). The push channel
//! polls and drains it. Slots are scoped by a session token so that
//! concurrent generations with distinct tokens do not interleave;
//! callers that omit the token all share the `default` slot, which then
//! carries the same last-write-wins behavior across requests.

pub mod push;

pub use push::{push_event_stream, ChannelGuard, PushChannelConfig};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

/// Slot token used when the caller supplies none.
pub const DEFAULT_CHANNEL: &str = "default";

/// Event kinds, serialized with their wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProgressKind {
    #[serde(rename = "connected")]
    Connected,
    #[serde(rename = "html_generation_started")]
    GenerationStarted,
    #[serde(rename = "llm_provider_selected")]
    ProviderSelected,
    #[serde(rename = "ai_response_completed")]
    ResponseCompleted,
    #[serde(rename = "html_parsing_started")]
    ParsingStarted,
    #[serde(rename = "file_saving_started")]
    SavingStarted,
    #[serde(rename = "file_saved")]
    Saved,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "timeout")]
    Timeout,
}

impl ProgressKind {
    /// Terminal-class events close the push channel after delivery.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Saved | Self::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::GenerationStarted => "html_generation_started",
            Self::ProviderSelected => "llm_provider_selected",
            Self::ResponseCompleted => "ai_response_completed",
            Self::ParsingStarted => "html_parsing_started",
            Self::SavingStarted => "file_saving_started",
            Self::Saved => "file_saved",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// One lifecycle notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub message: String,
    pub payload: Option<serde_json::Value>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: None,
        }
    }

    pub fn with_payload(
        kind: ProgressKind,
        message: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: Some(payload),
        }
    }

    /// Wire envelope: `{"type": <kind>, "data": {"message": …}}`, with
    /// payload keys merged into `data`.
    pub fn wire_json(&self) -> serde_json::Value {
        let mut data = serde_json::json!({ "message": self.message });
        if let (Some(serde_json::Value::Object(extra)), serde_json::Value::Object(map)) =
            (&self.payload, &mut data)
        {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }
        serde_json::json!({ "type": self.kind, "data": data })
    }
}

/// Single-slot, lossy event store. Writers overwrite unconditionally;
/// the poller takes and clears.
#[derive(Default)]
pub struct Mailbox {
    slot: Mutex<Option<ProgressEvent>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an event, discarding any unread one (last write wins).
    pub fn publish(&self, event: ProgressEvent) {
        tracing::debug!(
            kind = event.kind.as_str(),
            message = %event.message,
            "Progress event published",
        );
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(event);
        }
    }

    /// Take the unread event, leaving the slot empty.
    pub fn take(&self) -> Option<ProgressEvent> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// Registry of mailboxes keyed by session token.
#[derive(Default)]
pub struct ProgressHub {
    channels: Mutex<HashMap<String, Arc<Mailbox>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailbox for `token`, created on first use.
    pub fn channel(&self, token: &str) -> Arc<Mailbox> {
        let mut channels = self.channels.lock().expect("progress hub lock");
        channels.entry(token.to_string()).or_default().clone()
    }

    /// Drop the mailbox for `token`. Later writers recreate it, but
    /// with no subscriber their events are effectively discarded.
    pub fn release(&self, token: &str) {
        if let Ok(mut channels) = self.channels.lock() {
            channels.remove(token);
        }
    }

    #[cfg(test)]
    pub(crate) fn channel_count(&self) -> usize {
        self.channels.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// Writer handle binding a hub and a session token.
///
/// Publishing re-resolves the mailbox on every event, so an observer
/// that reconnects mid-generation picks up subsequent events.
#[derive(Clone)]
pub struct ProgressSender {
    hub: Arc<ProgressHub>,
    token: String,
}

impl ProgressSender {
    pub fn new(hub: Arc<ProgressHub>, token: impl Into<String>) -> Self {
        Self {
            hub,
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn publish(&self, event: ProgressEvent) {
        self.hub.channel(&self.token).publish(event);
    }
}
