//! Autoconfirm - per-tab auto-confirmation agent
//!
//! An independent agent that attaches to a Chromium browser to:
//! - Watch chat tabs for the assistant's latest message
//! - Classify finished messages as confirmation prompts
//! - Submit an affirmative reply on the user's behalf, once per message

pub mod classifier;
pub mod cursor;
pub mod dom;
pub mod resolver;
pub mod responder;
pub mod session;
pub mod streaming;
pub mod tabs;

pub use classifier::{Classification, ConfirmationClassifier};
pub use cursor::ProcessingCursor;
pub use resolver::{MessageSnapshot, SelectorConfig, SelectorResolver};
pub use responder::AutoResponder;
pub use session::{SessionController, TickOutcome};
pub use tabs::{TabCommand, TabInfo, TabRegistry};

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration for Autoconfirm
#[derive(Debug, Clone)]
pub struct AutoConfirmConfig {
    /// Text submitted when a confirmation prompt is detected
    pub reply_text: String,

    /// Cadence of the per-tab message check
    pub poll_interval: Duration,

    /// Delay between classification and the reply injection
    pub pre_reply_delay: Duration,

    /// Settling delay after an in-page navigation before polling resumes
    pub restart_delay: Duration,

    /// URL substrings identifying chat tabs worth watching
    pub url_patterns: Vec<String>,

    /// Whether newly discovered tabs start enabled
    pub enable_on_attach: bool,

    /// Ordered DOM query patterns for messages and controls
    pub selectors: SelectorConfig,
}

impl Default for AutoConfirmConfig {
    fn default() -> Self {
        Self {
            reply_text: "Yes".to_string(),
            poll_interval: Duration::from_secs(2),
            pre_reply_delay: Duration::from_secs(1),
            restart_delay: Duration::from_secs(1),
            url_patterns: vec!["chat.openai.com".to_string(), "chatgpt.com".to_string()],
            enable_on_attach: false,
            selectors: SelectorConfig::default(),
        }
    }
}

impl AutoConfirmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply_text(mut self, text: impl Into<String>) -> Self {
        self.reply_text = text.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_url_patterns(mut self, patterns: Vec<String>) -> Self {
        self.url_patterns = patterns;
        self
    }

    pub fn with_enable_on_attach(mut self, enable: bool) -> Self {
        self.enable_on_attach = enable;
        self
    }

    /// Merge settings from a `config.toml` if it exists.
    ///
    /// File values override the defaults; CLI flags are applied on top by
    /// the caller. A missing or malformed file is skipped, never fatal.
    pub fn load_file(mut self, path: &Path) -> Self {
        if !path.exists() {
            return self;
        }
        let Ok(content) = std::fs::read_to_string(path) else {
            return self;
        };
        let Ok(file) = toml::from_str::<ConfigToml>(&content) else {
            tracing::warn!("Ignoring malformed config file {}", path.display());
            return self;
        };

        if let Some(text) = file.reply_text {
            self.reply_text = text;
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.pre_reply_delay_ms {
            self.pre_reply_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = file.restart_delay_ms {
            self.restart_delay = Duration::from_millis(ms);
        }
        if let Some(patterns) = file.url_patterns {
            if !patterns.is_empty() {
                self.url_patterns = patterns;
            }
        }
        if let Some(enable) = file.enable_on_attach {
            self.enable_on_attach = enable;
        }
        if let Some(list) = file.message_selectors {
            if !list.is_empty() {
                self.selectors.message_selectors = list;
            }
        }
        if let Some(list) = file.input_selectors {
            if !list.is_empty() {
                self.selectors.input_selectors = list;
            }
        }
        if let Some(list) = file.send_selectors {
            if !list.is_empty() {
                self.selectors.send_selectors = list;
            }
        }
        self
    }
}

/// Partial config.toml parsing. Every field is optional; the defaults in
/// `AutoConfirmConfig` cover the rest.
#[derive(Debug, Deserialize)]
struct ConfigToml {
    reply_text: Option<String>,
    poll_interval_ms: Option<u64>,
    pre_reply_delay_ms: Option<u64>,
    restart_delay_ms: Option<u64>,
    url_patterns: Option<Vec<String>>,
    enable_on_attach: Option<bool>,
    message_selectors: Option<Vec<String>>,
    input_selectors: Option<Vec<String>>,
    send_selectors: Option<Vec<String>>,
}

/// Result type for Autoconfirm operations
pub type Result<T> = std::result::Result<T, AutoConfirmError>;

/// Errors that can occur in Autoconfirm
#[derive(Debug, thiserror::Error)]
pub enum AutoConfirmError {
    #[error("Failed to attach to browser: {0}")]
    BrowserAttach(String),

    #[error("Browser command failed: {0}")]
    Browser(String),

    #[error("Script evaluation failed: {0}")]
    Script(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AutoConfirmConfig::default();
        assert_eq!(config.reply_text, "Yes");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert!(!config.enable_on_attach);
        assert!(config.url_patterns.iter().any(|p| p.contains("chatgpt")));
    }

    #[test]
    fn test_builder() {
        let config = AutoConfirmConfig::new()
            .with_reply_text("Go ahead")
            .with_enable_on_attach(true)
            .with_url_patterns(vec!["claude.ai".to_string()]);
        assert_eq!(config.reply_text, "Go ahead");
        assert!(config.enable_on_attach);
        assert_eq!(config.url_patterns, vec!["claude.ai".to_string()]);
    }

    #[test]
    fn test_load_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
reply_text = "Sure"
poll_interval_ms = 500
url_patterns = ["example.com"]
"#,
        )
        .unwrap();

        let config = AutoConfirmConfig::default().load_file(&path);
        assert_eq!(config.reply_text, "Sure");
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.url_patterns, vec!["example.com".to_string()]);
        // Untouched fields keep their defaults
        assert_eq!(config.pre_reply_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_load_file_missing_or_malformed() {
        let dir = tempfile::tempdir().unwrap();

        let config = AutoConfirmConfig::default().load_file(&dir.path().join("absent.toml"));
        assert_eq!(config.reply_text, "Yes");

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "reply_text = [not toml").unwrap();
        let config = AutoConfirmConfig::default().load_file(&bad);
        assert_eq!(config.reply_text, "Yes");
    }
}
