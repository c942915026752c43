//! Chat endpoint: relays the analyst query to the selected backend and
//! streams the filtered narrative back to the caller.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::progress::{ProgressEvent, ProgressKind, ProgressSender, DEFAULT_CHANNEL};
use crate::prompt;
use crate::provider::{
    ChatMessage, ChunkDecoder, OllamaClient, OllamaDecoder, OpenAiClient, OpenAiDecoder,
    ProviderError, ProviderKind,
};
use crate::stream::{complete_generation, run_relay};

/// Buffered narrative fragments between the relay task and the
/// response body.
const LIVE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// Progress channel token. Callers that omit it share the default
    /// slot, including its last-write-wins behavior across requests.
    #[serde(default)]
    pub session: Option<String>,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
    pub done: bool,
}

/// `POST /api/chat` — generate an analysis.
///
/// With `stream` set (the default), responds with a plain-text stream
/// of narrative fragments while the report document is extracted and
/// saved in the background. Without it, waits for the full response,
/// finalizes it the same way, and returns the content in one JSON
/// body.
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let token = request
        .session
        .clone()
        .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
    let progress = ProgressSender::new(ctx.progress.clone(), token);

    progress.publish(ProgressEvent::new(
        ProgressKind::GenerationStarted,
        "Starting AI response processing",
    ));

    // Selected once per request: OpenAI when a key is configured,
    // the local Ollama server otherwise.
    let provider = if ctx.settings.openai_configured() {
        ProviderKind::OpenAi
    } else {
        ProviderKind::Ollama
    };
    progress.publish(ProgressEvent::with_payload(
        ProgressKind::ProviderSelected,
        match provider {
            ProviderKind::OpenAi => "Using the OpenAI API",
            ProviderKind::Ollama => "Using Ollama (local model)",
        },
        serde_json::json!({ "provider": provider }),
    ));
    tracing::info!(%provider, stream = request.stream, "Generation request accepted");

    let result = if request.stream {
        start_streaming(&ctx, provider, &request.messages, progress.clone()).await
    } else {
        run_blocking(&ctx, provider, &request.messages, &progress).await
    };

    match result {
        Ok(response) => Ok(response),
        Err(err) => {
            tracing::error!(error = %err, %provider, "Generation request failed");
            progress.publish(ProgressEvent::with_payload(
                ProgressKind::Error,
                "The generation request failed",
                serde_json::json!({ "error": err.to_string() }),
            ));
            Err(ApiError::from(err))
        }
    }
}

/// Open the backend stream and spawn the relay; the response body
/// drains the live channel.
async fn start_streaming(
    ctx: &ApiContext,
    provider: ProviderKind,
    messages: &[ChatMessage],
    progress: ProgressSender,
) -> Result<Response, ProviderError> {
    let system_prompt = prompt::system_prompt();

    let (upstream, decoder): (reqwest::Response, Box<dyn ChunkDecoder>) = match provider {
        ProviderKind::OpenAi => {
            let client = OpenAiClient::new(ctx.http.clone(), &ctx.settings);
            let response = client.chat(system_prompt, messages, true).await?;
            (response, Box::new(OpenAiDecoder::new()))
        }
        ProviderKind::Ollama => {
            let client = OllamaClient::new(ctx.http.clone(), &ctx.settings);
            let response = client
                .generate(system_prompt, &latest_user_message(messages), true)
                .await?;
            (response, Box::new(OllamaDecoder::new()))
        }
    };

    let (tx, rx) = mpsc::channel::<Bytes>(LIVE_CHANNEL_CAPACITY);
    let store = ctx.reports.clone();
    tokio::spawn(async move {
        run_relay(upstream.bytes_stream(), decoder, tx, progress, store).await;
    });

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, std::convert::Infallible>(chunk), rx))
    }));

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .expect("static response parts");
    Ok(response)
}

/// Wait for the complete response, finalize it through the shared
/// path, and return it in one piece.
async fn run_blocking(
    ctx: &ApiContext,
    provider: ProviderKind,
    messages: &[ChatMessage],
    progress: &ProgressSender,
) -> Result<Response, ProviderError> {
    let system_prompt = prompt::system_prompt();

    let content = match provider {
        ProviderKind::OpenAi => {
            OpenAiClient::new(ctx.http.clone(), &ctx.settings)
                .chat_completion(system_prompt, messages)
                .await?
        }
        ProviderKind::Ollama => {
            OllamaClient::new(ctx.http.clone(), &ctx.settings)
                .generate_once(system_prompt, &latest_user_message(messages))
                .await?
        }
    };

    complete_generation(&content, progress, &ctx.reports);

    Ok(Json(ChatResponse {
        content,
        done: true,
    })
    .into_response())
}

/// The single-prompt backend takes only the latest user turn.
fn latest_user_message(messages: &[ChatMessage]) -> String {
    messages
        .last()
        .map(|message| message.content.clone())
        .unwrap_or_default()
}
