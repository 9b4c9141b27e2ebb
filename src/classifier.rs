//! Confirmation-prompt classification
//!
//! Pure keyword/pattern heuristics over the assistant's message text.
//! No retained state: callers pass fresh text each poll cycle.

use regex::Regex;

/// Keywords associated with confirmation semantics.
const CONFIRMATION_KEYWORDS: &[&str] = &[
    "confirm",
    "proceed",
    "continue",
    "yes",
    "no",
    "okay",
    "sure",
    "would you like",
    "do you want",
    "shall i",
    "should i",
    "are you sure",
    "is this correct",
    "confirm this",
    "proceed with",
    "continue with",
    "go ahead",
    "start",
    "begin",
    "execute",
];

/// Keywords that suppress the generic confirmation branches.
const NEGATIVE_KEYWORDS: &[&str] = &["no", "cancel", "stop", "abort", "never"];

/// Broader action keywords; count as confirmation only in question form.
const ACTION_KEYWORDS: &[&str] = &[
    "confirm", "proceed", "continue", "go ahead", "start", "begin", "execute", "run", "launch",
];

/// Interrogative phrasings that mark a question even without a trailing `?`.
const INTERROGATIVE_PHRASES: &[&str] = &[
    "would you like",
    "do you want",
    "shall i",
    "should i",
    "would you like me to",
    "do you want me to",
    "should i proceed",
    "shall i proceed",
    "can i proceed",
    "may i proceed",
];

/// Canonical confirmation phrasings. A literal match here is treated as a
/// confirmation request outright, bypassing the negative-keyword suppressor.
const EXACT_PHRASES: &[&str] = &[
    "would you like me to",
    "do you want me to",
    "should i proceed",
    "shall i proceed",
    "can i proceed",
    "may i proceed",
    "would you like me to proceed",
    "do you want me to continue",
    "should i continue",
    "shall i continue",
    "can i continue",
    "may i continue",
    "would you like me to start",
    "do you want me to start",
    "should i start",
    "shall i start",
    "can i start",
    "may i start",
];

/// Messages shorter than this are never confirmation prompts.
const MIN_PROMPT_LEN: usize = 10;

/// The signals that contributed to a classification, kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_confirmation: bool,
    pub has_keyword: bool,
    pub is_question: bool,
    pub has_negative: bool,
    pub has_pattern: bool,
    pub has_exact_phrase: bool,
}

impl Classification {
    fn rejected() -> Self {
        Self {
            is_confirmation: false,
            has_keyword: false,
            is_question: false,
            has_negative: false,
            has_pattern: false,
            has_exact_phrase: false,
        }
    }
}

/// Classifier deciding whether a message asks for a go/no-go confirmation.
///
/// Deterministic and case-insensitive; operates on trimmed text. The
/// decision requires a topical keyword in interrogative form (with
/// negatively-phrased text suppressed), or a canonical phrasing that is a
/// confirmation request regardless of hedging language.
pub struct ConfirmationClassifier {
    trailing_question: Regex,
}

impl ConfirmationClassifier {
    pub fn new() -> Self {
        Self {
            trailing_question: Regex::new(r"\?\s*$").unwrap(),
        }
    }

    /// Classify `text`, returning the full signal record.
    pub fn classify(&self, text: &str) -> Classification {
        let lower = text.trim().to_lowercase();

        if lower.len() < MIN_PROMPT_LEN {
            return Classification::rejected();
        }

        let has_keyword = CONFIRMATION_KEYWORDS.iter().any(|k| lower.contains(k));
        let is_question = self.trailing_question.is_match(&lower)
            || INTERROGATIVE_PHRASES.iter().any(|p| lower.contains(p));
        let has_negative = NEGATIVE_KEYWORDS.iter().any(|k| lower.contains(k));
        let has_pattern = ACTION_KEYWORDS.iter().any(|k| lower.contains(k));
        let has_exact_phrase = EXACT_PHRASES.iter().any(|p| lower.contains(p));

        let is_confirmation = (has_keyword && is_question && !has_negative)
            || has_exact_phrase
            || (has_pattern && is_question && !has_negative);

        Classification {
            is_confirmation,
            has_keyword,
            is_question,
            has_negative,
            has_pattern,
            has_exact_phrase,
        }
    }

    /// Convenience wrapper around `classify`.
    pub fn is_confirmation_prompt(&self, text: &str) -> bool {
        self.classify(text).is_confirmation
    }
}

impl Default for ConfirmationClassifier {
    fn default() -> Self {
        Self::new()
    }
}
