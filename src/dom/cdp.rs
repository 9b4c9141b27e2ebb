//! DevTools-backed script host
//!
//! Attaches to a running Chromium over its DevTools websocket, or launches
//! a headful instance when no endpoint is given. Each chat tab surfaces as
//! a `Page`, which implements [`ScriptHost`] directly.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::ScriptHost;
use crate::{AutoConfirmError, Result};

impl ScriptHost for Page {
    fn eval_json(&self, expression: &str) -> impl std::future::Future<Output = Result<Value>> + Send {
        let page = self.clone();
        let expression = expression.to_string();
        async move {
            let result = page
                .evaluate(expression)
                .await
                .map_err(|e| AutoConfirmError::Script(e.to_string()))?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        }
    }
}

/// A live browser connection plus its event-handler task.
pub struct BrowserHandle {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserHandle {
    /// Attach to an already-running browser via its DevTools endpoint,
    /// e.g. `http://127.0.0.1:9222`.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| AutoConfirmError::BrowserAttach(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Launch a headful browser. Headful because the user is expected to
    /// be chatting in these tabs themselves.
    pub async fn launch() -> Result<Self> {
        let config = BrowserConfig::builder()
            .with_head()
            .build()
            .map_err(AutoConfirmError::BrowserAttach)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutoConfirmError::BrowserAttach(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Pages whose URL contains one of the chat URL patterns.
    ///
    /// Targets are re-fetched first so tabs opened since the last sweep
    /// are seen.
    pub async fn chat_pages(&mut self, patterns: &[String]) -> Result<Vec<Page>> {
        self.browser
            .fetch_targets()
            .await
            .map_err(|e| AutoConfirmError::Browser(e.to_string()))?;
        let pages = self
            .browser
            .pages()
            .await
            .map_err(|e| AutoConfirmError::Browser(e.to_string()))?;

        let mut matching = Vec::new();
        for page in pages {
            let url = match page.url().await {
                Ok(Some(url)) => url,
                _ => continue,
            };
            if patterns.iter().any(|p| url.contains(p.as_str())) {
                matching.push(page);
            }
        }
        Ok(matching)
    }

    /// Liveness check against the browser endpoint.
    pub async fn ping(&self) -> bool {
        self.browser.version().await.is_ok()
    }

    pub async fn close(mut self) {
        let _ = self.browser.close().await;
        self.handler_task.abort();
    }
}
