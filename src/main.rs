//! Autoconfirm CLI
//!
//! Attaches to a Chromium browser, watches chat tabs, and auto-replies to
//! confirmation prompts. Tabs are controlled from a small console on
//! stdin: `list`, `on <n>`, `off <n>`, `status <n>`, `quit`.

use autoconfirm::dom::BrowserHandle;
use autoconfirm::{AutoConfirmConfig, TabCommand, TabRegistry};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Autoconfirm - auto-reply to chat confirmation prompts
#[derive(Parser, Debug)]
#[command(name = "autoconfirm")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// DevTools endpoint of a running browser (e.g. http://127.0.0.1:9222).
    /// When omitted, a new headful browser is launched.
    #[arg(long)]
    cdp_url: Option<String>,

    /// URL substring a tab must match to be watched (repeatable)
    #[arg(long = "pattern")]
    patterns: Vec<String>,

    /// Text submitted when a confirmation prompt is detected
    #[arg(long)]
    reply_text: Option<String>,

    /// Poll cadence in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Start every discovered tab enabled
    #[arg(long)]
    enable_all: bool,

    /// Path to a config.toml (defaults to ~/.autoconfirm/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output: show per-tick evaluations
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&cli)?;
    info!("Starting Autoconfirm");
    info!("Reply text: {:?}", config.reply_text);
    info!("URL patterns: {:?}", config.url_patterns);

    let browser = match &cli.cdp_url {
        Some(url) => {
            info!("Connecting to browser at {}", url);
            BrowserHandle::connect(url).await?
        }
        None => {
            info!("Launching browser");
            BrowserHandle::launch().await?
        }
    };

    if !browser.ping().await {
        anyhow::bail!("Browser endpoint is not responding");
    }

    let (cmd_tx, cmd_rx) = mpsc::channel::<TabCommand>(32);
    let registry = TabRegistry::new(browser, config, cmd_rx);
    let registry_handle = tokio::spawn(registry.run());

    // Blocking stdin reader feeding the console loop
    let (line_tx, mut line_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    println!("Commands: list | on <n> | off <n> | status <n> | quit");
    while let Some(line) = line_rx.recv().await {
        match parse_command(&line) {
            Some(ConsoleCommand::List) => {
                let (reply, rx) = oneshot::channel();
                cmd_tx.send(TabCommand::List { reply }).await?;
                let tabs = rx.await?;
                if tabs.is_empty() {
                    println!("No chat tabs attached");
                }
                for tab in tabs {
                    let state = if tab.enabled { "on" } else { "off" };
                    println!("[{}] {} ({})", tab.index, tab.url, state);
                }
            }
            Some(ConsoleCommand::Set { target, enable }) => {
                let (reply, rx) = oneshot::channel();
                cmd_tx.send(TabCommand::Status { target, reply }).await?;
                match rx.await? {
                    None => println!("No tab [{}]", target),
                    Some(current) if current == enable => {
                        println!("Tab [{}] already {}", target, on_off(enable));
                    }
                    Some(_) => {
                        let (reply, rx) = oneshot::channel();
                        cmd_tx.send(TabCommand::Toggle { target, reply }).await?;
                        match rx.await? {
                            Some(now) => println!("Tab [{}] {}", target, on_off(now)),
                            None => println!("No tab [{}]", target),
                        }
                    }
                }
            }
            Some(ConsoleCommand::Status { target }) => {
                let (reply, rx) = oneshot::channel();
                cmd_tx.send(TabCommand::Status { target, reply }).await?;
                match rx.await? {
                    Some(enabled) => println!("Tab [{}] {}", target, on_off(enabled)),
                    None => println!("No tab [{}]", target),
                }
            }
            Some(ConsoleCommand::Quit) => break,
            None => {
                if !line.trim().is_empty() {
                    println!("Unknown command: {}", line.trim());
                }
            }
        }
    }

    info!("Shutting down");
    let _ = cmd_tx.send(TabCommand::Shutdown).await;
    let _ = registry_handle.await;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    List,
    Set { target: usize, enable: bool },
    Status { target: usize },
    Quit,
}

fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let mut parts = line.split_whitespace();
    let verb = parts.next()?;
    match verb {
        "list" | "ls" => Some(ConsoleCommand::List),
        "on" => Some(ConsoleCommand::Set {
            target: parts.next()?.parse().ok()?,
            enable: true,
        }),
        "off" => Some(ConsoleCommand::Set {
            target: parts.next()?.parse().ok()?,
            enable: false,
        }),
        "status" => Some(ConsoleCommand::Status {
            target: parts.next()?.parse().ok()?,
        }),
        "quit" | "exit" | "q" => Some(ConsoleCommand::Quit),
        _ => None,
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Defaults, overlaid by the config file, overlaid by CLI flags.
fn build_config(cli: &Cli) -> anyhow::Result<AutoConfirmConfig> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => autoconfirm_home()?.join("config.toml"),
    };
    let mut config = AutoConfirmConfig::default().load_file(&config_path);

    if !cli.patterns.is_empty() {
        config = config.with_url_patterns(cli.patterns.clone());
    }
    if let Some(text) = &cli.reply_text {
        config = config.with_reply_text(text.clone());
    }
    if let Some(ms) = cli.poll_interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    if cli.enable_all {
        config = config.with_enable_on_attach(true);
    }
    Ok(config)
}

/// Config directory: $AUTOCONFIRM_HOME, else ~/.autoconfirm
fn autoconfirm_home() -> anyhow::Result<PathBuf> {
    if let Ok(home) = std::env::var("AUTOCONFIRM_HOME") {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".autoconfirm"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autoconfirm_home() {
        let result = autoconfirm_home();
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("list"), Some(ConsoleCommand::List));
        assert_eq!(
            parse_command("on 2"),
            Some(ConsoleCommand::Set {
                target: 2,
                enable: true
            })
        );
        assert_eq!(
            parse_command("off 0"),
            Some(ConsoleCommand::Set {
                target: 0,
                enable: false
            })
        );
        assert_eq!(
            parse_command("status 1"),
            Some(ConsoleCommand::Status { target: 1 })
        );
        assert_eq!(parse_command("quit"), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("on"), None);
        assert_eq!(parse_command("on two"), None);
        assert_eq!(parse_command("frobnicate"), None);
    }

    #[test]
    fn test_build_config_cli_overrides() {
        let cli = Cli {
            cdp_url: None,
            patterns: vec!["claude.ai".to_string()],
            reply_text: Some("Go ahead".to_string()),
            poll_interval_ms: Some(250),
            enable_all: true,
            config: Some(PathBuf::from("/nonexistent/config.toml")),
            verbose: false,
        };
        let config = build_config(&cli).unwrap();
        assert_eq!(config.url_patterns, vec!["claude.ai".to_string()]);
        assert_eq!(config.reply_text, "Go ahead");
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert!(config.enable_on_attach);
    }
}
