//! Per-tab session
//!
//! One controller per attached chat tab. Each poll tick resolves the
//! latest assistant message, dedups against the processing cursor, skips
//! messages still streaming, classifies, and replies at most once per
//! message. Navigations reset the session so a fresh conversation starts
//! from a clean cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::classifier::ConfirmationClassifier;
use crate::cursor::ProcessingCursor;
use crate::dom::{self, ScriptHost};
use crate::resolver::SelectorResolver;
use crate::responder::AutoResponder;
use crate::streaming::is_still_streaming;
use crate::{AutoConfirmConfig, Result};

/// What one poll tick did, mostly for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Auto-confirmation is switched off for this tab.
    Disabled,
    /// The document URL changed since the last tick.
    Navigated,
    /// No assistant message found on the page.
    NoMessage,
    /// The newest message is still being generated.
    Streaming,
    /// The newest message was evaluated on an earlier tick.
    AlreadyProcessed,
    /// Evaluated and found not to be a confirmation prompt.
    NotConfirmation,
    /// A reply was submitted.
    Replied,
    /// The page navigated away during the pre-reply delay; reply dropped.
    Stale,
}

pub struct SessionController<H: ScriptHost> {
    host: H,
    config: AutoConfirmConfig,
    resolver: SelectorResolver,
    classifier: ConfirmationClassifier,
    responder: AutoResponder,
    enabled: Arc<AtomicBool>,
    cursor: ProcessingCursor,
    document_url: Option<String>,
}

impl<H: ScriptHost> SessionController<H> {
    pub fn new(host: H, config: AutoConfirmConfig, enabled: Arc<AtomicBool>) -> Self {
        let resolver = SelectorResolver::new(config.selectors.clone());
        Self {
            host,
            config,
            resolver,
            classifier: ConfirmationClassifier::new(),
            responder: AutoResponder::new(),
            enabled,
            cursor: ProcessingCursor::new(),
            document_url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Run one evaluation pass over the tab.
    pub async fn poll_tick(&mut self) -> Result<TickOutcome> {
        // Navigation is checked even while disabled so the cursor never
        // carries over into a different conversation.
        let url = dom::current_url(&self.host).await?;
        match &self.document_url {
            Some(previous) if *previous != url => {
                info!(from = %previous, to = %url, "Navigation detected, resetting session");
                self.document_url = Some(url);
                self.cursor = ProcessingCursor::new();
                return Ok(TickOutcome::Navigated);
            }
            None => {
                self.document_url = Some(url);
            }
            _ => {}
        }

        if !self.is_enabled() {
            return Ok(TickOutcome::Disabled);
        }

        let Some(snapshot) = self.resolver.find_latest_assistant_message(&self.host).await? else {
            return Ok(TickOutcome::NoMessage);
        };

        if !self.cursor.should_process(snapshot.timestamp_ms) {
            return Ok(TickOutcome::AlreadyProcessed);
        }

        // Streaming leaves the cursor untouched so the finished text is
        // evaluated on a later tick.
        if is_still_streaming(&snapshot) {
            debug!("Latest message still streaming");
            return Ok(TickOutcome::Streaming);
        }

        self.cursor.mark_processed(snapshot.timestamp_ms);

        let classification = self.classifier.classify(&snapshot.text);
        debug!(
            via_fallback = snapshot.via_fallback,
            is_confirmation = classification.is_confirmation,
            "Evaluated message: {:.60}",
            snapshot.text
        );
        if !classification.is_confirmation {
            return Ok(TickOutcome::NotConfirmation);
        }

        info!("Confirmation prompt detected: {:.80}", snapshot.text);
        tokio::time::sleep(self.config.pre_reply_delay).await;

        // The page may have navigated while we waited.
        let url_after = dom::current_url(&self.host).await?;
        if self.document_url.as_deref() != Some(url_after.as_str()) {
            info!("Page navigated during pre-reply delay, dropping reply");
            self.document_url = Some(url_after);
            self.cursor = ProcessingCursor::new();
            return Ok(TickOutcome::Stale);
        }

        self.responder
            .respond(&self.host, &self.resolver, &self.config.reply_text)
            .await?;
        info!(reply = %self.config.reply_text, "Auto-reply submitted");
        Ok(TickOutcome::Replied)
    }

    /// Poll until the task is aborted. Script failures (tab closing,
    /// mid-navigation evaluation) are logged and retried next tick.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.poll_tick().await {
                Ok(TickOutcome::Navigated) => {
                    tokio::time::sleep(self.config.restart_delay).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Poll tick failed: {e}");
                }
            }
        }
    }
}
