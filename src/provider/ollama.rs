//! Ollama generation backend: HTTP client and line-delimited decoder.

use serde::{Deserialize, Serialize};

use super::types::{NormalizedToken, ProviderError, ProviderKind};
use super::ChunkDecoder;
use crate::config::Settings;

/// Cap on the line reassembly buffer. A line still unparseable after
/// growing past this limit fails the request instead of accumulating
/// for the rest of the stream.
pub const MAX_REASSEMBLY_BYTES: usize = 64 * 1024;

/// HTTP client for a local Ollama instance.
pub struct OllamaClient {
    base_url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, settings: &Settings) -> Self {
        Self {
            base_url: settings.ollama_base_url.trim_end_matches('/').to_string(),
            model: settings.ollama_model.clone(),
            temperature: settings.temperature,
            client,
        }
    }

    /// Send a generate request.
    ///
    /// With `stream` set, the body is newline-delimited JSON, one
    /// `{"response", "done"}` object per line; decode it with
    /// [`OllamaDecoder`].
    pub async fn generate(
        &self,
        system_prompt: &str,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let body = GenerateRequest {
            model: &self.model,
            system: system_prompt,
            prompt,
            stream,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::Ollama, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: ProviderKind::Ollama,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Non-streaming generation: returns the full response text.
    pub async fn generate_once(
        &self,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let response = self.generate(system_prompt, prompt, false).await?;
        let parsed: GenerateChunk = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::Ollama, e))?;
        Ok(parsed.response.unwrap_or_default())
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One line of a streaming generate response.
#[derive(Deserialize)]
struct GenerateChunk {
    response: Option<String>,
    #[serde(default)]
    done: bool,
}

/// Decoder for the line-delimited framing.
///
/// Chunk boundaries may split an object mid-line, so an unconsumed
/// tail is carried in a reassembly buffer and retried with the next
/// chunk. The buffer is bounded by [`MAX_REASSEMBLY_BYTES`].
#[derive(Default)]
pub struct OllamaDecoder {
    buffer: String,
}

impl OllamaDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkDecoder for OllamaDecoder {
    fn decode(&mut self, chunk: &str) -> Result<Vec<NormalizedToken>, ProviderError> {
        let mut tokens = Vec::new();
        for line in chunk.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let candidate = if self.buffer.is_empty() {
                line.to_string()
            } else {
                format!("{}{line}", self.buffer)
            };
            match serde_json::from_str::<GenerateChunk>(&candidate) {
                Ok(parsed) => {
                    self.buffer.clear();
                    tokens.push(NormalizedToken {
                        content: parsed.response.filter(|text| !text.is_empty()),
                        is_terminal: parsed.done,
                    });
                }
                Err(_) => {
                    self.buffer = candidate;
                    if self.buffer.len() > MAX_REASSEMBLY_BYTES {
                        self.buffer.clear();
                        return Err(ProviderError::ReassemblyOverflow {
                            limit: MAX_REASSEMBLY_BYTES,
                        });
                    }
                }
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(response: &str, done: bool) -> String {
        format!(
            "{{\"response\":{},\"done\":{done}}}\n",
            serde_json::to_string(response).unwrap()
        )
    }

    #[test]
    fn decodes_whole_lines() {
        let mut decoder = OllamaDecoder::new();
        let chunk = format!("{}{}", line("Spot", false), line(" prices rose", false));
        let tokens = decoder.decode(&chunk).unwrap();
        assert_eq!(
            tokens,
            vec![
                NormalizedToken::text("Spot"),
                NormalizedToken::text(" prices rose"),
            ]
        );
    }

    #[test]
    fn done_line_is_terminal() {
        let mut decoder = OllamaDecoder::new();
        let tokens = decoder.decode(&line("", true)).unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_terminal);
        assert!(tokens[0].content.is_none());
    }

    #[test]
    fn terminal_line_may_carry_content() {
        let mut decoder = OllamaDecoder::new();
        let tokens = decoder.decode(&line("tail", true)).unwrap();
        assert_eq!(tokens[0].content.as_deref(), Some("tail"));
        assert!(tokens[0].is_terminal);
    }

    #[test]
    fn reassembles_line_split_across_chunks() {
        let mut decoder = OllamaDecoder::new();
        let full = line("gas storage", false);
        // Split inside the "response" field name.
        let tokens = decoder.decode(&full[..7]).unwrap();
        assert!(tokens.is_empty());
        let tokens = decoder.decode(&full[7..]).unwrap();
        assert_eq!(tokens, vec![NormalizedToken::text("gas storage")]);
    }

    #[test]
    fn reassembles_line_split_three_ways() {
        let mut decoder = OllamaDecoder::new();
        let full = line("LNG imports", false);
        assert!(decoder.decode(&full[..5]).unwrap().is_empty());
        assert!(decoder.decode(&full[5..20]).unwrap().is_empty());
        let tokens = decoder.decode(&full[20..]).unwrap();
        assert_eq!(tokens, vec![NormalizedToken::text("LNG imports")]);
    }

    #[test]
    fn buffer_clears_after_successful_parse() {
        let mut decoder = OllamaDecoder::new();
        let first = line("a", false);
        decoder.decode(&first[..4]).unwrap();
        decoder.decode(&first[4..]).unwrap();
        // A fresh complete line must parse on its own.
        let tokens = decoder.decode(&line("b", false)).unwrap();
        assert_eq!(tokens, vec![NormalizedToken::text("b")]);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let mut decoder = OllamaDecoder::new();
        let chunk = format!("\n\n{}\n", line("x", false));
        let tokens = decoder.decode(&chunk).unwrap();
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn unbounded_garbage_fails_the_stream() {
        let mut decoder = OllamaDecoder::new();
        // A permanently malformed line that never parses.
        let garbage = "x".repeat(MAX_REASSEMBLY_BYTES / 2);
        assert!(decoder.decode(&garbage).is_ok());
        assert!(decoder.decode(&garbage).is_ok());
        let result = decoder.decode(&garbage);
        assert!(matches!(
            result,
            Err(ProviderError::ReassemblyOverflow { .. })
        ));
    }

    #[test]
    fn empty_response_field_yields_contentless_token() {
        let mut decoder = OllamaDecoder::new();
        let tokens = decoder.decode(&line("", false)).unwrap();
        assert_eq!(tokens, vec![NormalizedToken::empty()]);
    }
}
