//! The per-request relay pipeline: upstream bytes in, filtered
//! narrative out, finalization and persistence at the end.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::progress::{ProgressEvent, ProgressKind, ProgressSender};
use crate::provider::{ChunkDecoder, Utf8Carry};
use crate::report::ReportStore;
use crate::stream::filter::{FilterAction, TokenFilter};
use crate::stream::finalize::{finalize, FinalizeOutcome};

/// How a relay run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RelayEnd {
    /// Terminal marker seen; finalization ran.
    Finalized,
    /// The caller went away while narrative was still being forwarded.
    ClientDisconnected,
    /// Upstream closed without a terminal marker.
    UpstreamEnded,
    /// Upstream transport or decode failure.
    Failed,
}

/// Drive one generation stream end to end.
///
/// Forwards filtered narrative fragments into `live_tx` until the
/// report payload begins, accumulates the complete raw text, and on
/// the terminal marker finalizes, persists, and notifies. Returning
/// drops the upstream connection on every exit path.
pub async fn run_relay<S>(
    upstream: S,
    mut decoder: Box<dyn ChunkDecoder>,
    live_tx: mpsc::Sender<Bytes>,
    progress: ProgressSender,
    store: ReportStore,
) -> RelayEnd
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut carry = Utf8Carry::new();
    let mut filter = TokenFilter::new();
    let mut live_tx = Some(live_tx);

    while let Some(next) = upstream.next().await {
        let bytes = match next {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "Upstream read failed");
                progress.publish(ProgressEvent::new(
                    ProgressKind::Error,
                    "The generation stream failed mid-response",
                ));
                return RelayEnd::Failed;
            }
        };

        let text = carry.push(&bytes);
        let tokens = match decoder.decode(&text) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::error!(error = %e, "Upstream chunk decoding failed");
                progress.publish(ProgressEvent::new(ProgressKind::Error, e.to_string()));
                return RelayEnd::Failed;
            }
        };

        for token in tokens {
            match filter.feed(&token) {
                FilterAction::Forward(fragment) => {
                    if let Some(tx) = live_tx.as_ref() {
                        if tx.send(Bytes::from(fragment)).await.is_err() {
                            // Caller aborted: stop consuming and release
                            // the upstream connection.
                            tracing::debug!("Live output receiver dropped, aborting relay");
                            return RelayEnd::ClientDisconnected;
                        }
                    }
                }
                FilterAction::Drop => {}
                FilterAction::DocumentBoundary => {
                    // Close the live response; keep consuming so the
                    // report can be extracted and saved.
                    live_tx = None;
                    progress.publish(ProgressEvent::new(
                        ProgressKind::ResponseCompleted,
                        "AI response completed",
                    ));
                    progress.publish(ProgressEvent::new(
                        ProgressKind::ParsingStarted,
                        "Parsing the report document",
                    ));
                }
                FilterAction::Finalize => {
                    drop(live_tx);
                    complete_generation(filter.accumulated(), &progress, &store);
                    return RelayEnd::Finalized;
                }
            }
        }
    }

    tracing::warn!("Upstream ended without a terminal marker");
    progress.publish(ProgressEvent::new(
        ProgressKind::Error,
        "Generation ended unexpectedly",
    ));
    RelayEnd::UpstreamEnded
}

/// Finalize the full accumulated text: reparse, persist, notify.
///
/// Shared between the streaming relay and the non-streaming chat path.
pub fn complete_generation(full_text: &str, progress: &ProgressSender, store: &ReportStore) {
    match finalize(full_text, chrono::Utc::now()) {
        FinalizeOutcome::Document { html } => {
            progress.publish(ProgressEvent::new(
                ProgressKind::SavingStarted,
                "Saving the report file",
            ));
            save_and_notify(&html, progress, store, "Report file saved");
        }
        FinalizeOutcome::Fallback { html } => {
            progress.publish(ProgressEvent::new(
                ProgressKind::SavingStarted,
                "Saving the report file (fallback)",
            ));
            save_and_notify(&html, progress, store, "Report file saved (fallback)");
        }
        FinalizeOutcome::MissingDocument => {
            tracing::warn!("Structured response carried no report document");
            progress.publish(ProgressEvent::new(
                ProgressKind::Error,
                "The response contained no report document",
            ));
        }
        FinalizeOutcome::ParseFailure { detail } => {
            tracing::warn!(detail = %detail, "Failed to parse the generated report");
            progress.publish(ProgressEvent::with_payload(
                ProgressKind::Error,
                "Failed to parse the generated report",
                serde_json::json!({ "error": detail }),
            ));
        }
    }
}

fn save_and_notify(html: &str, progress: &ProgressSender, store: &ReportStore, message: &str) {
    match store.save(html) {
        Ok(filename) => {
            progress.publish(ProgressEvent::with_payload(
                ProgressKind::Saved,
                message,
                serde_json::json!({ "filename": filename }),
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, "Report save failed");
            progress.publish(ProgressEvent::new(
                ProgressKind::Error,
                "Failed to save the report file",
            ));
        }
    }
}
