//! Streaming detection
//!
//! Decides whether a located assistant message is still being generated.
//! While a message streams, classification is skipped and the processing
//! cursor is left untouched so the message is re-evaluated next poll.

use crate::resolver::MessageSnapshot;

/// In-progress indicators looked up among the message's descendants.
/// Embedded into the page probe; the match result comes back as a flag.
pub const TYPING_INDICATOR_SELECTORS: &[&str] = &[
    ".typing-indicator",
    "[data-testid=\"typing-indicator\"]",
    ".animate-pulse",
    "[class*=\"typing\"]",
    "[class*=\"loading\"]",
];

/// Class-name fragments marking the message element itself as in-progress.
const STREAMING_CLASS_MARKERS: &[&str] = &["typing", "loading", "animate-pulse"];

/// Texts shorter than this that trail off in an ellipsis are treated as
/// still being emitted.
const SHORT_TEXT_LIMIT: usize = 50;

/// True if the message looks like it is still being generated.
pub fn is_still_streaming(snapshot: &MessageSnapshot) -> bool {
    if snapshot.has_streaming_descendant {
        return true;
    }
    if STREAMING_CLASS_MARKERS
        .iter()
        .any(|marker| snapshot.class_name.contains(marker))
    {
        return true;
    }
    snapshot.text.len() < SHORT_TEXT_LIMIT && snapshot.text.contains("...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(text: &str) -> MessageSnapshot {
        MessageSnapshot {
            text: text.to_string(),
            timestamp_ms: 1,
            class_name: String::new(),
            has_streaming_descendant: false,
            matched_by: None,
            via_fallback: false,
        }
    }

    #[test]
    fn test_descendant_indicator() {
        let mut s = snapshot("Working on it");
        s.has_streaming_descendant = true;
        assert!(is_still_streaming(&s));
    }

    #[test]
    fn test_own_class_marker() {
        let mut s = snapshot("Working on it");
        s.class_name = "message animate-pulse".to_string();
        assert!(is_still_streaming(&s));
        s.class_name = "result-loading".to_string();
        assert!(is_still_streaming(&s));
    }

    #[test]
    fn test_short_ellipsis_heuristic() {
        assert!(is_still_streaming(&snapshot("Thinking...")));
        assert!(!is_still_streaming(&snapshot("Done. Anything else?")));
    }

    #[test]
    fn test_long_text_with_ellipsis_is_finished() {
        let text = "Here is the plan... first we back up the data, then we run \
                    the migration, then we verify the results.";
        assert!(!is_still_streaming(&snapshot(text)));
    }
}
