//! Headless mode runner - one app, NDJSON out, control lines in
//!
//! Wires the engine to a [`HubConnector`], the stdout mirror and a blocking
//! stdin reader that turns each line into a local control.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use lensmirror_app::config::load_settings;
use lensmirror_app::{AppKind, Engine, LocalAction, Message, Preferences};
use lensmirror_bridge::HubConnector;
use lensmirror_core::prelude::Result;

use super::{HeadlessEvent, HeadlessMirror};
use crate::signals::spawn_signal_handler;

/// What to run, as given on the command line.
#[derive(Debug, Clone)]
pub struct HeadlessOptions {
    pub app: AppKind,
    pub config: Option<PathBuf>,
    /// Overrides `[bridge] url`
    pub bridge: Option<String>,
    /// Quicktest layout loaded before the first connect resolves
    pub layout: Option<PathBuf>,
}

/// Run in headless mode until `quit` or a termination signal
pub async fn run_headless(options: HeadlessOptions) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("lensmirror starting in HEADLESS mode");
    info!("App: {}", options.app);
    info!("═══════════════════════════════════════════════════════");

    let settings = load_settings(options.config.as_deref());
    let url = options
        .bridge
        .clone()
        .unwrap_or_else(|| settings.bridge.url.clone());
    info!("Bridge hub: {}", url);

    let connector = HubConnector::new(url)
        .with_request_timeout(Duration::from_millis(settings.bridge.request_timeout_ms));
    let prefs = Preferences::open_default();

    let engine = Engine::new(
        options.app,
        settings,
        prefs,
        connector,
        Box::new(HeadlessMirror),
    );

    let tx = engine.msg_sender();
    if let Some(layout) = options.layout {
        if options.app == AppKind::Quicktest {
            let _ = tx.send(Message::Action(LocalAction::Layout(layout))).await;
        } else {
            warn!("--layout is only used by the quicktest app, ignoring");
        }
    }

    spawn_signal_handler(tx.clone());

    // Spawn headless-specific stdin reader
    std::thread::spawn(move || {
        spawn_stdin_reader_blocking(tx);
    });

    let result = engine.run().await;
    if let Err(ref e) = result {
        error!("Engine error: {}", e);
        HeadlessEvent::error(e.to_string(), true).emit();
    }

    info!("lensmirror headless mode exiting");
    result
}

/// Read control lines from stdin and forward them to the engine (blocking)
fn spawn_stdin_reader_blocking(msg_tx: mpsc::Sender<Message>) {
    use std::io::BufRead;

    let stdin = std::io::stdin();
    let reader = stdin.lock();

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        match LocalAction::parse(&line) {
            Ok(Some(action)) => {
                let quit = action == LocalAction::Quit;
                if msg_tx.blocking_send(Message::Action(action)).is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Rejected stdin command '{}': {}", line.trim(), e);
                HeadlessEvent::error(e.to_string(), false).emit();
            }
        }
    }

    info!("Stdin reader exiting");
}
