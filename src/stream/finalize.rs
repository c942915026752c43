//! Full-payload finalization: one strict reparse of the complete
//! accumulated text once streaming ends.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// The parsed outcome of a completed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredResult {
    pub narrative: String,
    pub document: Option<String>,
}

/// What finalization decided to do with the accumulated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Strict parse succeeded and the report document is present.
    Document { html: String },
    /// Strict parse succeeded but no report document was included.
    MissingDocument,
    /// The text is not structured at all; a wrapped fallback document
    /// was synthesized from it.
    Fallback { html: String },
    /// The text looks structured (leading object delimiter) but failed
    /// to parse.
    ParseFailure { detail: String },
}

#[derive(Deserialize)]
struct AnalystPayload {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    html: Option<String>,
}

/// Decide the outcome for the complete accumulated text.
///
/// "Looks structured" is exactly "the trimmed text starts with `{`".
/// That cheap discrimination selects between the fallback and the hard
/// failure, so it must not be replaced with a deeper structural check.
pub fn finalize(full_text: &str, generated_at: DateTime<Utc>) -> FinalizeOutcome {
    match serde_json::from_str::<AnalystPayload>(full_text) {
        Ok(payload) => {
            let result = StructuredResult {
                narrative: payload.answer.unwrap_or_default(),
                document: payload.html.filter(|html| !html.is_empty()),
            };
            match result.document {
                Some(html) => FinalizeOutcome::Document { html },
                None => FinalizeOutcome::MissingDocument,
            }
        }
        Err(err) => {
            if full_text.trim().starts_with('{') {
                FinalizeOutcome::ParseFailure {
                    detail: err.to_string(),
                }
            } else {
                FinalizeOutcome::Fallback {
                    html: wrap_plain_text(full_text, generated_at),
                }
            }
        }
    }
}

/// Wrap unstructured narrative text in a complete standalone report
/// document. Newlines become `<br>`; the text is inserted as-is.
pub fn wrap_plain_text(text: &str, generated_at: DateTime<Utc>) -> String {
    let body = text.replace('\n', "<br>");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Analysis Report</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }}
        .container {{ max-width: 800px; margin: 0 auto; }}
        .header {{ border-bottom: 2px solid #007bff; padding-bottom: 20px; margin-bottom: 30px; }}
        .content {{ background: #f8f9fa; padding: 20px; border-radius: 8px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Energy Market Analysis Report</h1>
            <p>Generated: {generated}</p>
        </div>
        <div class="content">
            <h2>Analysis</h2>
            <p>{body}</p>
        </div>
    </div>
</body>
</html>"#,
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    )
}
