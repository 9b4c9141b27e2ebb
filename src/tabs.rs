//! Tab registry & watchdog
//!
//! Tracks one session per chat tab. A periodic watchdog sweep attaches to
//! newly opened matching tabs and reaps sessions whose tab closed, so the
//! registry stays honest even when tabs come and go between commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::dom::BrowserHandle;
use crate::session::SessionController;
use crate::AutoConfirmConfig;

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Control commands, one per console verb.
#[derive(Debug)]
pub enum TabCommand {
    /// Flip a tab's enabled flag; replies with the new state, or `None`
    /// for an unknown index.
    Toggle {
        target: usize,
        reply: oneshot::Sender<Option<bool>>,
    },
    /// Read a tab's enabled flag without changing it.
    Status {
        target: usize,
        reply: oneshot::Sender<Option<bool>>,
    },
    /// Enumerate known tabs.
    List {
        reply: oneshot::Sender<Vec<TabInfo>>,
    },
    Shutdown,
}

/// One row of `list` output.
#[derive(Debug, Clone)]
pub struct TabInfo {
    pub index: usize,
    pub url: String,
    pub enabled: bool,
}

struct SessionEntry {
    target: String,
    url: String,
    enabled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Session bookkeeping, kept separate from the browser so the command
/// handling stays testable.
#[derive(Default)]
struct TabTable {
    entries: Vec<SessionEntry>,
}

impl TabTable {
    fn contains(&self, target: &str) -> bool {
        self.entries.iter().any(|e| e.target == target)
    }

    fn insert(&mut self, entry: SessionEntry) {
        self.entries.push(entry);
    }

    /// Drop entries whose task finished or whose target is gone.
    fn reap(&mut self, live_targets: &[String]) {
        self.entries.retain(|entry| {
            let keep = !entry.task.is_finished()
                && live_targets.iter().any(|t| t == &entry.target);
            if !keep {
                entry.task.abort();
                info!(url = %entry.url, "Detached from closed tab");
            }
            keep
        });
    }

    fn toggle(&self, index: usize) -> Option<bool> {
        let entry = self.entries.get(index)?;
        let now = !entry.enabled.load(Ordering::SeqCst);
        entry.enabled.store(now, Ordering::SeqCst);
        info!(url = %entry.url, enabled = now, "Toggled tab");
        Some(now)
    }

    fn status(&self, index: usize) -> Option<bool> {
        self.entries
            .get(index)
            .map(|e| e.enabled.load(Ordering::SeqCst))
    }

    fn list(&self) -> Vec<TabInfo> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, e)| TabInfo {
                index,
                url: e.url.clone(),
                enabled: e.enabled.load(Ordering::SeqCst),
            })
            .collect()
    }

    fn abort_all(&mut self) {
        for entry in self.entries.drain(..) {
            entry.task.abort();
        }
    }
}

pub struct TabRegistry {
    browser: BrowserHandle,
    config: AutoConfirmConfig,
    table: TabTable,
    rx: mpsc::Receiver<TabCommand>,
}

impl TabRegistry {
    pub fn new(
        browser: BrowserHandle,
        config: AutoConfirmConfig,
        rx: mpsc::Receiver<TabCommand>,
    ) -> Self {
        Self {
            browser,
            config,
            table: TabTable::default(),
            rx,
        }
    }

    /// Serve commands and run the watchdog until shutdown.
    pub async fn run(mut self) {
        let mut watchdog = tokio::time::interval(WATCHDOG_INTERVAL);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = watchdog.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!("Tab sweep failed: {e}");
                    }
                }
                cmd = self.rx.recv() => match cmd {
                    Some(TabCommand::Toggle { target, reply }) => {
                        let _ = reply.send(self.table.toggle(target));
                    }
                    Some(TabCommand::Status { target, reply }) => {
                        let _ = reply.send(self.table.status(target));
                    }
                    Some(TabCommand::List { reply }) => {
                        let _ = reply.send(self.table.list());
                    }
                    Some(TabCommand::Shutdown) | None => break,
                },
            }
        }
        self.table.abort_all();
        self.browser.close().await;
    }

    /// Attach to new matching tabs and reap dead sessions.
    async fn sweep(&mut self) -> crate::Result<()> {
        let pages = self.browser.chat_pages(&self.config.url_patterns).await?;
        let live: Vec<String> = pages
            .iter()
            .map(|p| p.target_id().inner().clone())
            .collect();
        self.table.reap(&live);

        for page in pages {
            let target = page.target_id().inner().clone();
            if self.table.contains(&target) {
                continue;
            }
            let url = match page.url().await {
                Ok(Some(url)) => url,
                _ => continue,
            };
            let enabled = Arc::new(AtomicBool::new(self.config.enable_on_attach));
            let session =
                SessionController::new(page, self.config.clone(), Arc::clone(&enabled));
            let task = tokio::spawn(session.run());
            info!(url = %url, enabled = self.config.enable_on_attach, "Attached to tab");
            self.table.insert(SessionEntry {
                target,
                url,
                enabled,
                task,
            });
        }
        debug!(tabs = self.table.entries.len(), "Sweep complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(target: &str, url: &str, enabled: bool) -> SessionEntry {
        SessionEntry {
            target: target.to_string(),
            url: url.to_string(),
            enabled: Arc::new(AtomicBool::new(enabled)),
            task: tokio::spawn(std::future::pending::<()>()),
        }
    }

    #[tokio::test]
    async fn test_toggle_flips_and_reports() {
        let mut table = TabTable::default();
        table.insert(entry("t1", "https://chatgpt.com/c/1", false));

        assert_eq!(table.toggle(0), Some(true));
        assert_eq!(table.status(0), Some(true));
        assert_eq!(table.toggle(0), Some(false));
        assert_eq!(table.toggle(7), None);
        table.abort_all();
    }

    #[tokio::test]
    async fn test_status_does_not_flip() {
        let mut table = TabTable::default();
        table.insert(entry("t1", "https://chatgpt.com/c/1", true));

        assert_eq!(table.status(0), Some(true));
        assert_eq!(table.status(0), Some(true));
        assert_eq!(table.status(3), None);
        table.abort_all();
    }

    #[tokio::test]
    async fn test_list_enumerates_in_order() {
        let mut table = TabTable::default();
        table.insert(entry("t1", "https://chatgpt.com/c/1", false));
        table.insert(entry("t2", "https://chatgpt.com/c/2", true));

        let tabs = table.list();
        assert_eq!(tabs.len(), 2);
        assert_eq!(tabs[0].index, 0);
        assert!(!tabs[0].enabled);
        assert_eq!(tabs[1].url, "https://chatgpt.com/c/2");
        assert!(tabs[1].enabled);
        table.abort_all();
    }

    #[tokio::test]
    async fn test_reap_drops_closed_tabs() {
        let mut table = TabTable::default();
        table.insert(entry("t1", "https://chatgpt.com/c/1", true));
        table.insert(entry("t2", "https://chatgpt.com/c/2", false));

        table.reap(&["t2".to_string()]);
        let tabs = table.list();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].url, "https://chatgpt.com/c/2");
        table.abort_all();
    }

    #[tokio::test]
    async fn test_reap_drops_finished_sessions() {
        let mut table = TabTable::default();
        let finished = SessionEntry {
            target: "t1".to_string(),
            url: "https://chatgpt.com/c/1".to_string(),
            enabled: Arc::new(AtomicBool::new(true)),
            task: tokio::spawn(async {}),
        };
        // Let the task complete before sweeping.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        table.insert(finished);

        table.reap(&["t1".to_string()]);
        assert!(table.list().is_empty());
    }
}
