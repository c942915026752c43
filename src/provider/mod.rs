//! Backend adapters for the two generation providers.
//!
//! Each provider pairs an HTTP client with a [`ChunkDecoder`] that
//! normalizes its incremental wire framing into [`NormalizedToken`]s:
//! the OpenAI adapter consumes `data: `-prefixed event records closed
//! by a `[DONE]` sentinel, the Ollama adapter consumes newline-delimited
//! JSON objects that may arrive split across chunk boundaries. A
//! decoder is selected once per request; downstream of it the relay
//! pipeline is provider-agnostic.

pub mod ollama;
pub mod openai;
pub mod types;

pub use ollama::{OllamaClient, OllamaDecoder};
pub use openai::{OpenAiClient, OpenAiDecoder};
pub use types::{ChatMessage, NormalizedToken, ProviderError, ProviderKind};

/// Normalizes one backend's incremental response framing into tokens.
///
/// Implementations are stateful (line reassembly) and single-request:
/// create one per generation stream.
pub trait ChunkDecoder: Send {
    fn decode(&mut self, chunk: &str) -> Result<Vec<NormalizedToken>, ProviderError>;
}

/// Incremental UTF-8 decoder carrying split multi-byte sequences
/// between network chunks.
#[derive(Default)]
pub struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes and return the longest decodable prefix.
    ///
    /// A trailing incomplete sequence is kept for the next call;
    /// genuinely invalid bytes are replaced with U+FFFD.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    out.push_str(
                        std::str::from_utf8(&self.pending[..valid_len])
                            .expect("validated prefix"),
                    );
                    match err.error_len() {
                        // Incomplete trailing sequence: keep it for the
                        // next chunk.
                        None => {
                            self.pending.drain(..valid_len);
                            return out;
                        }
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid_len + bad);
                        }
                    }
                }
            }
        }
    }
}
