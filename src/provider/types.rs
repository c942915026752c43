//! Shared provider types and the wire error taxonomy.

use serde::{Deserialize, Serialize};

/// Which generation backend serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenAi,
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "OpenAI"),
            Self::Ollama => write!(f, "Ollama"),
        }
    }
}

/// One chat turn as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A provider-agnostic increment of generated text.
///
/// `content` is `None` for records that carried no usable text,
/// including records that failed to parse (logged, not fatal).
/// `is_terminal` marks the end of generation for the request; the
/// terminal record may itself carry content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedToken {
    pub content: Option<String>,
    pub is_terminal: bool,
}

impl NormalizedToken {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_terminal: false,
        }
    }

    /// A record that carried no usable content.
    pub fn empty() -> Self {
        Self {
            content: None,
            is_terminal: false,
        }
    }

    pub fn terminal() -> Self {
        Self {
            content: None,
            is_terminal: true,
        }
    }
}

/// Errors from provider clients and decoders.
///
/// Transport and parse failures never crash a request handler; they
/// resolve into a progress error event and/or an error response body.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("The OpenAI API is unreachable — check the API key and network settings")]
    OpenAiUnreachable,

    #[error("The Ollama server is unreachable — check that it is running")]
    OllamaUnreachable,

    #[error("{provider} returned an error (HTTP {status}): {body}")]
    Api {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("Request to {provider} timed out")]
    Timeout { provider: ProviderKind },

    #[error("Unexpected response from {provider}: {detail}")]
    UnexpectedResponse {
        provider: ProviderKind,
        detail: String,
    },

    #[error("Streamed line reassembly exceeded {limit} bytes")]
    ReassemblyOverflow { limit: usize },

    #[error("Network error talking to {provider}: {detail}")]
    Network {
        provider: ProviderKind,
        detail: String,
    },
}

impl ProviderError {
    /// Which backend produced the failure, when attributable.
    pub fn provider(&self) -> Option<ProviderKind> {
        match self {
            Self::OpenAiUnreachable => Some(ProviderKind::OpenAi),
            Self::OllamaUnreachable => Some(ProviderKind::Ollama),
            Self::Api { provider, .. }
            | Self::Timeout { provider }
            | Self::UnexpectedResponse { provider, .. }
            | Self::Network { provider, .. } => Some(*provider),
            Self::ReassemblyOverflow { .. } => None,
        }
    }

    /// Map a transport failure onto the taxonomy.
    pub(crate) fn from_reqwest(provider: ProviderKind, err: reqwest::Error) -> Self {
        if err.is_connect() {
            match provider {
                ProviderKind::OpenAi => Self::OpenAiUnreachable,
                ProviderKind::Ollama => Self::OllamaUnreachable,
            }
        } else if err.is_timeout() {
            Self::Timeout { provider }
        } else {
            Self::Network {
                provider,
                detail: err.to_string(),
            }
        }
    }
}
