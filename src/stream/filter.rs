//! Live narrative filter over the normalized token stream.
//!
//! A single-pass state machine that forwards human-readable narrative
//! fragments as they arrive while suppressing the embedded report
//! payload. It accumulates the complete raw text regardless of state;
//! the finalizer reparses that accumulation when the stream ends.
//!
//! The filter is a heuristic over a token-by-token serialization of a
//! two-field JSON object. It matches structural fragments exactly and
//! watches for the report field name as a substring; it does not parse
//! JSON incrementally, so it is sensitive to key reordering and to
//! narrative text that itself contains the marker. That sensitivity is
//! pinned by tests below as documented behavior.

use crate::provider::NormalizedToken;

/// Structural fragments the serializer emits as standalone increments.
/// Never forwarded.
pub const EXCLUSION_FRAGMENTS: &[&str] = &[
    "{\n",
    "{\r\n",
    "{\"",
    "\":\"",
    "\"",
    "answer",
    "\",",
    "{",
    "}",
    "",
    " \"",
    "\":",
    "   ",
    "\",\"",
];

/// Substring marking the start of the report field's value.
pub const DOCUMENT_FIELD_MARKER: &str = "html";

/// Trailing quote plus separator closing the narrative value.
pub const VALUE_TERMINATOR: &str = "\",";

/// Filter phase. Transitions are monotonic within one request:
/// Scanning, then Forwarding, then Suppressed, never backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// No narrative has been forwarded yet.
    Scanning,
    /// Narrative fragments are flowing to the caller.
    Forwarding,
    /// The report payload has begun; nothing is forwarded any more.
    Suppressed,
}

/// What the caller should do with one processed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterAction {
    /// Forward this text to the live output.
    Forward(String),
    /// Drop the fragment silently.
    Drop,
    /// The report payload just started: stop the live output and
    /// announce extraction.
    DocumentBoundary,
    /// End of generation: run finalization over the accumulation.
    Finalize,
}

/// Per-request filter instance. Feed tokens one at a time.
pub struct TokenFilter {
    state: FilterState,
    accumulated: String,
}

impl TokenFilter {
    pub fn new() -> Self {
        Self {
            state: FilterState::Scanning,
            accumulated: String::new(),
        }
    }

    pub fn state(&self) -> FilterState {
        self.state
    }

    /// Complete raw text seen so far, including suppressed content.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Process one token and decide what the caller does with it.
    pub fn feed(&mut self, token: &NormalizedToken) -> FilterAction {
        // Accumulate before anything else: the finalizer needs every
        // fragment, and the terminal record may itself carry content.
        if let Some(content) = token.content.as_deref() {
            self.accumulated.push_str(content);
        }

        if token.is_terminal {
            return FilterAction::Finalize;
        }

        if self.state == FilterState::Suppressed {
            return FilterAction::Drop;
        }

        let Some(content) = token.content.as_deref() else {
            return FilterAction::Drop;
        };

        if EXCLUSION_FRAGMENTS.contains(&content) {
            return FilterAction::Drop;
        }

        if content.contains(DOCUMENT_FIELD_MARKER) {
            self.state = FilterState::Suppressed;
            return FilterAction::DocumentBoundary;
        }

        if content.contains(VALUE_TERMINATOR) {
            let stripped = content.replace(VALUE_TERMINATOR, "");
            if stripped.is_empty() || stripped == "\"" {
                return FilterAction::Drop;
            }
            self.state = FilterState::Forwarding;
            return FilterAction::Forward(stripped);
        }

        self.state = FilterState::Forwarding;
        FilterAction::Forward(content.to_string())
    }
}

impl Default for TokenFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str) -> NormalizedToken {
        NormalizedToken::text(content)
    }

    /// Feed a token sequence and collect everything that was forwarded.
    fn forwarded(filter: &mut TokenFilter, fragments: &[&str]) -> String {
        let mut out = String::new();
        for fragment in fragments {
            if let FilterAction::Forward(chunk) = filter.feed(&text(fragment)) {
                out.push_str(&chunk);
            }
        }
        out
    }

    // ── Exclusion fragments ─────────────────────────────

    #[test]
    fn exclusion_fragments_are_never_forwarded() {
        for fragment in EXCLUSION_FRAGMENTS {
            let mut filter = TokenFilter::new();
            // Enter Forwarding first so the check covers the hot state.
            assert!(matches!(
                filter.feed(&text("narrative")),
                FilterAction::Forward(_)
            ));
            assert_eq!(
                filter.feed(&text(fragment)),
                FilterAction::Drop,
                "fragment {fragment:?} must not be forwarded",
            );
        }
    }

    #[test]
    fn exclusion_fragments_dropped_while_scanning() {
        let mut filter = TokenFilter::new();
        assert_eq!(filter.feed(&text("{\"")), FilterAction::Drop);
        assert_eq!(filter.feed(&text("answer")), FilterAction::Drop);
        assert_eq!(filter.state(), FilterState::Scanning);
    }

    // ── State transitions ───────────────────────────────

    #[test]
    fn first_forward_enters_forwarding() {
        let mut filter = TokenFilter::new();
        assert_eq!(filter.state(), FilterState::Scanning);
        filter.feed(&text("The"));
        assert_eq!(filter.state(), FilterState::Forwarding);
    }

    #[test]
    fn marker_suppresses_and_never_recovers() {
        let mut filter = TokenFilter::new();
        filter.feed(&text("The market"));
        assert_eq!(filter.feed(&text("html")), FilterAction::DocumentBoundary);
        assert_eq!(filter.state(), FilterState::Suppressed);

        // Nothing reaches the output afterwards, whatever the content.
        assert_eq!(filter.feed(&text("more narrative")), FilterAction::Drop);
        assert_eq!(filter.feed(&text("<!DOCTYPE html>")), FilterAction::Drop);
        assert_eq!(filter.state(), FilterState::Suppressed);
    }

    #[test]
    fn marker_can_fire_straight_from_scanning() {
        let mut filter = TokenFilter::new();
        assert_eq!(filter.feed(&text("html")), FilterAction::DocumentBoundary);
        assert_eq!(filter.state(), FilterState::Suppressed);
    }

    #[test]
    fn boundary_fires_only_once() {
        let mut filter = TokenFilter::new();
        assert_eq!(filter.feed(&text("html")), FilterAction::DocumentBoundary);
        assert_eq!(filter.feed(&text("html")), FilterAction::Drop);
    }

    // ── Value terminator ────────────────────────────────

    #[test]
    fn terminator_is_stripped_before_forwarding() {
        let mut filter = TokenFilter::new();
        assert_eq!(
            filter.feed(&text("tightened.\",")),
            FilterAction::Forward("tightened.".to_string())
        );
    }

    #[test]
    fn terminator_leaving_lone_quote_is_dropped() {
        let mut filter = TokenFilter::new();
        assert_eq!(filter.feed(&text("\"\",")), FilterAction::Drop);
    }

    #[test]
    fn terminator_leaving_nothing_is_dropped() {
        // The bare terminator itself is already an exclusion fragment;
        // a repeated terminator strips to empty.
        let mut filter = TokenFilter::new();
        assert_eq!(filter.feed(&text("\",\",")), FilterAction::Drop);
    }

    // ── Terminal handling ───────────────────────────────

    #[test]
    fn terminal_triggers_finalize() {
        let mut filter = TokenFilter::new();
        filter.feed(&text("body"));
        assert_eq!(
            filter.feed(&NormalizedToken::terminal()),
            FilterAction::Finalize
        );
    }

    #[test]
    fn terminal_content_is_accumulated() {
        let mut filter = TokenFilter::new();
        filter.feed(&text("head"));
        let terminal = NormalizedToken {
            content: Some("tail".to_string()),
            is_terminal: true,
        };
        assert_eq!(filter.feed(&terminal), FilterAction::Finalize);
        assert_eq!(filter.accumulated(), "headtail");
    }

    #[test]
    fn terminal_wins_even_when_suppressed() {
        let mut filter = TokenFilter::new();
        filter.feed(&text("html"));
        assert_eq!(
            filter.feed(&NormalizedToken::terminal()),
            FilterAction::Finalize
        );
    }

    // ── Accumulation ────────────────────────────────────

    #[test]
    fn accumulation_covers_all_states() {
        let fragments = [
            "{\"", "answer", "\":\"", "X", "\",\"", "html", "\":\"", "<p>doc</p>", "\"}",
        ];
        let mut filter = TokenFilter::new();
        for fragment in fragments {
            filter.feed(&text(fragment));
        }
        assert_eq!(
            filter.accumulated(),
            "{\"answer\":\"X\",\"html\":\"<p>doc</p>\"}"
        );
    }

    #[test]
    fn contentless_tokens_accumulate_nothing() {
        let mut filter = TokenFilter::new();
        assert_eq!(filter.feed(&NormalizedToken::empty()), FilterAction::Drop);
        assert_eq!(filter.accumulated(), "");
    }

    // ── End-to-end token sequence ───────────────────────

    #[test]
    fn canonical_object_forwards_only_the_narrative() {
        let fragments = [
            "{\"", "answer", "\":\"", "The", " market", " tightened.", "\",\"", "html", "\":\"",
            "<!DOCTYPE html><html></html>", "\"}",
        ];
        let mut filter = TokenFilter::new();
        let out = forwarded(&mut filter, &fragments);
        assert_eq!(out, "The market tightened.");
        assert_eq!(filter.state(), FilterState::Suppressed);
    }

    #[test]
    fn narrative_closed_by_terminator_token() {
        let fragments = ["{\"", "answer", "\":\"", "Prices fell", ".\",", "html"];
        let mut filter = TokenFilter::new();
        let out = forwarded(&mut filter, &fragments);
        assert_eq!(out, "Prices fell.");
        assert_eq!(filter.state(), FilterState::Suppressed);
    }

    // ── Documented fragility ────────────────────────────

    #[test]
    fn narrative_containing_marker_suppresses_early() {
        // The marker is matched as a plain substring, so narrative that
        // mentions it ends the live stream prematurely. The full text
        // still accumulates for finalization.
        let mut filter = TokenFilter::new();
        filter.feed(&text("The report uses "));
        assert_eq!(
            filter.feed(&text("html tables")),
            FilterAction::DocumentBoundary
        );
        assert_eq!(filter.state(), FilterState::Suppressed);
        assert_eq!(filter.accumulated(), "The report uses html tables");
    }

    #[test]
    fn unusual_tokenization_leaks_structure() {
        // Fragments that do not match the expected serializer shapes
        // pass straight through; the filter makes no attempt to parse.
        let mut filter = TokenFilter::new();
        assert_eq!(
            filter.feed(&text("{\"ans")),
            FilterAction::Forward("{\"ans".to_string())
        );
    }
}
