//! OpenAI-compatible chat backend: HTTP client and event-record decoder.

use serde::{Deserialize, Serialize};

use super::types::{ChatMessage, NormalizedToken, ProviderError, ProviderKind};
use super::ChunkDecoder;
use crate::config::Settings;

/// Sentinel record value closing a completion stream.
const DONE_SENTINEL: &str = "[DONE]";

/// Prefix stripped from each logical record.
const RECORD_PREFIX: &str = "data: ";

/// HTTP client for an OpenAI-compatible chat-completions API.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(client: reqwest::Client, settings: &Settings) -> Self {
        Self {
            base_url: settings.openai_base_url.trim_end_matches('/').to_string(),
            api_key: settings.openai_api_key.clone().unwrap_or_default(),
            model: settings.openai_model.clone(),
            temperature: settings.temperature,
            client,
        }
    }

    /// Send a chat-completions request.
    ///
    /// With `stream` set, the response body is a stream of `data: `
    /// records; decode it with [`OpenAiDecoder`].
    pub async fn chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut formatted = Vec::with_capacity(messages.len() + 1);
        formatted.push(ChatMessage {
            role: "system".to_string(),
            content: system_prompt.to_string(),
        });
        formatted.extend(messages.iter().cloned());

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &formatted,
            stream,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::OpenAi, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider: ProviderKind::OpenAi,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Non-streaming completion: returns the assistant message content.
    pub async fn chat_completion(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> Result<String, ProviderError> {
        let response = self.chat(system_prompt, messages, false).await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderKind::OpenAi, e))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .ok_or_else(|| ProviderError::UnexpectedResponse {
                provider: ProviderKind::OpenAi,
                detail: "no choices in completion response".to_string(),
            })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<AssistantMessage>,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// One record of a streaming completion response.
#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// Decoder for the event-record framing.
///
/// Each logical record is a `data: ` line; the `[DONE]` sentinel marks
/// the terminal. Records that fail to parse yield an empty token
/// (logged) rather than aborting the stream.
#[derive(Default)]
pub struct OpenAiDecoder;

impl OpenAiDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ChunkDecoder for OpenAiDecoder {
    fn decode(&mut self, chunk: &str) -> Result<Vec<NormalizedToken>, ProviderError> {
        let mut tokens = Vec::new();
        for line in chunk.lines() {
            let line = line.trim();
            let Some(record) = line.strip_prefix(RECORD_PREFIX) else {
                continue;
            };
            if record == DONE_SENTINEL {
                tokens.push(NormalizedToken::terminal());
                continue;
            }
            match serde_json::from_str::<ChatCompletionChunk>(record) {
                Ok(parsed) => {
                    let content = parsed
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.delta.content)
                        .filter(|content| !content.is_empty());
                    if let Some(content) = content {
                        tokens.push(NormalizedToken::text(content));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable completion record");
                    tokens.push(NormalizedToken::empty());
                }
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":{}}}}}]}}\n",
            serde_json::to_string(content).unwrap()
        )
    }

    #[test]
    fn decodes_content_records() {
        let mut decoder = OpenAiDecoder::new();
        let chunk = format!("{}{}", record("Day"), record("-ahead prices"));
        let tokens = decoder.decode(&chunk).unwrap();
        assert_eq!(
            tokens,
            vec![
                NormalizedToken::text("Day"),
                NormalizedToken::text("-ahead prices"),
            ]
        );
    }

    #[test]
    fn done_sentinel_is_terminal() {
        let mut decoder = OpenAiDecoder::new();
        let tokens = decoder.decode("data: [DONE]\n").unwrap();
        assert_eq!(tokens, vec![NormalizedToken::terminal()]);
    }

    #[test]
    fn malformed_record_yields_empty_token() {
        let mut decoder = OpenAiDecoder::new();
        let chunk = format!("data: {{not json}}\n{}", record("still going"));
        let tokens = decoder.decode(&chunk).unwrap();
        assert_eq!(tokens.len(), 2);
        assert!(tokens[0].content.is_none());
        assert!(!tokens[0].is_terminal);
        assert_eq!(tokens[1].content.as_deref(), Some("still going"));
    }

    #[test]
    fn role_only_record_yields_nothing() {
        // First chunk of a stream usually carries only the role.
        let mut decoder = OpenAiDecoder::new();
        let chunk = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n";
        let tokens = decoder.decode(chunk).unwrap();
        assert!(tokens.is_empty());
    }

    #[test]
    fn non_record_lines_are_ignored() {
        let mut decoder = OpenAiDecoder::new();
        let chunk = format!(": keep-alive comment\n\n{}", record("hi"));
        let tokens = decoder.decode(&chunk).unwrap();
        assert_eq!(tokens.len(), 1);
    }

    #[test]
    fn content_and_done_in_one_chunk() {
        let mut decoder = OpenAiDecoder::new();
        let chunk = format!("{}data: [DONE]\n", record("end"));
        let tokens = decoder.decode(&chunk).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].content.as_deref(), Some("end"));
        assert!(tokens[1].is_terminal);
    }

    #[test]
    fn empty_content_is_skipped() {
        let mut decoder = OpenAiDecoder::new();
        let tokens = decoder.decode(&record("")).unwrap();
        assert!(tokens.is_empty());
    }
}
