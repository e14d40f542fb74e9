//! Events emitted by the engine for the local mirror surface

use serde::Serialize;

use lensmirror_bridge::DisplayMode;

use crate::session::Phase;

/// Everything the local surface needs to show besides the mirrored regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Status {
        text: String,
    },
    Phase {
        phase: Phase,
    },
    Log {
        text: String,
    },
    LogCleared,
    /// The display client changed (connect, reconnect, revert)
    Mode {
        mode: DisplayMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    RenderFailed {
        startup: bool,
        message: String,
    },
    Error {
        message: String,
    },
}
