//! Headless mode - NDJSON mirror output
//!
//! The local mirror surface of a headless run is stdout: every region write
//! and every engine event is emitted as one JSON object per line, so a script
//! or test can follow the app without parsing a UI.
//!
//! # Event Format
//!
//! Each event has an "event" field naming its type, event-specific data, and
//! a millisecond `timestamp`.
//!
//! ```json
//! {"event":"status","text":"Timer: connecting to Even bridge...","timestamp":1767625445000}
//! {"event":"mode","mode":"mock","reason":"Bridge acquisition timed out after 6000ms","timestamp":1767625451000}
//! {"event":"mirror","region":"timer","content":"Timer 01:00","timestamp":1767625451001}
//! ```

pub mod runner;

use chrono::Utc;
use serde::Serialize;
use std::io::{self, Write};
use tracing::error;

use lensmirror_app::session::Phase;
use lensmirror_app::{EngineEvent, MirrorSurface};
use lensmirror_bridge::DisplayMode;

/// Events emitted in headless mode
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// A local mirror region changed
    Mirror {
        region: String,
        content: String,
        timestamp: i64,
    },

    Status { text: String, timestamp: i64 },

    Phase { phase: Phase, timestamp: i64 },

    /// Event log line (newest last on the stream)
    Log { text: String, timestamp: i64 },

    LogCleared { timestamp: i64 },

    /// Display client changed
    Mode {
        mode: DisplayMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: i64,
    },

    RenderFailed {
        startup: bool,
        message: String,
        timestamp: i64,
    },

    /// Error occurred (bad control line, engine failure)
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        // Write to stdout with newline (NDJSON format)
        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        // Flush to ensure immediate output
        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn mirror(region: &str, content: &str) -> Self {
        Self::Mirror {
            region: region.to_string(),
            content: content.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    pub fn from_engine_event(event: &EngineEvent) -> Self {
        let timestamp = Self::now();
        match event.clone() {
            EngineEvent::Status { text } => Self::Status { text, timestamp },
            EngineEvent::Phase { phase } => Self::Phase { phase, timestamp },
            EngineEvent::Log { text } => Self::Log { text, timestamp },
            EngineEvent::LogCleared => Self::LogCleared { timestamp },
            EngineEvent::Mode { mode, reason } => Self::Mode {
                mode,
                reason,
                timestamp,
            },
            EngineEvent::RenderFailed { startup, message } => Self::RenderFailed {
                startup,
                message,
                timestamp,
            },
            EngineEvent::Error { message } => Self::Error {
                message,
                fatal: false,
                timestamp,
            },
        }
    }
}

/// Mirror surface writing NDJSON to stdout.
#[derive(Debug, Default)]
pub struct HeadlessMirror;

impl MirrorSurface for HeadlessMirror {
    fn write(&mut self, region: &str, content: &str) {
        HeadlessEvent::mirror(region, content).emit();
    }

    fn publish(&mut self, event: &EngineEvent) {
        HeadlessEvent::from_engine_event(event).emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(event: &HeadlessEvent) -> Value {
        serde_json::to_value(event).unwrap()
    }

    #[test]
    fn test_mirror_event_shape() {
        let value = to_value(&HeadlessEvent::Mirror {
            region: "counter".into(),
            content: "3".into(),
            timestamp: 1000,
        });
        assert_eq!(
            value,
            json!({"event": "mirror", "region": "counter", "content": "3", "timestamp": 1000})
        );
    }

    #[test]
    fn test_mode_reason_omitted_when_absent() {
        let event = HeadlessEvent::from_engine_event(&EngineEvent::Mode {
            mode: DisplayMode::Bridge,
            reason: None,
        });
        let value = to_value(&event);
        assert_eq!(value["event"], "mode");
        assert_eq!(value["mode"], "bridge");
        assert!(value.get("reason").is_none());
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_engine_events_keep_their_payload() {
        let value = to_value(&HeadlessEvent::from_engine_event(&EngineEvent::Phase {
            phase: Phase::Running,
        }));
        assert_eq!(value["event"], "phase");
        assert_eq!(value["phase"], "running");

        let value = to_value(&HeadlessEvent::from_engine_event(&EngineEvent::RenderFailed {
            startup: true,
            message: "boom".into(),
        }));
        assert_eq!(value["event"], "render_failed");
        assert_eq!(value["startup"], true);

        let value = to_value(&HeadlessEvent::from_engine_event(&EngineEvent::LogCleared));
        assert_eq!(value["event"], "log_cleared");
    }

    #[test]
    fn test_error_event() {
        let value = to_value(&HeadlessEvent::error("unknown command 'x'".into(), false));
        assert_eq!(value["event"], "error");
        assert_eq!(value["fatal"], false);
    }
}
