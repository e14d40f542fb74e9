//! Application error types with rich context

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Bridge/Transport Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Bridge unavailable: {message}")]
    BridgeUnavailable { message: String },

    #[error("Bridge transport error: {message}")]
    Transport { message: String },

    #[error("Bridge protocol error: {message}")]
    Protocol { message: String },

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("Bridge connection closed")]
    Disconnected,

    // ─────────────────────────────────────────────────────────────
    // Rendering Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Render failed: {message}")]
    Render { message: String },

    #[error("Invalid page layout: {message}")]
    Layout { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown app: {name}")]
    UnknownApp { name: String },

    #[error("Invalid command: {message}")]
    InvalidCommand { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    // ─────────────────────────────────────────────────────────────
    // Outbound HTTP Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Request failed: {message}")]
    Request { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn bridge_unavailable(message: impl Into<String>) -> Self {
        Self::BridgeUnavailable {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, millis: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            millis,
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }

    pub fn layout(message: impl Into<String>) -> Self {
        Self::Layout {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn unknown_app(name: impl Into<String>) -> Self {
        Self::UnknownApp { name: name.into() }
    }

    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Errors that come from the bridge link rather than from local input.
    ///
    /// These are the failures that send an app back to the mock display.
    pub fn is_bridge_failure(&self) -> bool {
        matches!(
            self,
            Error::BridgeUnavailable { .. }
                | Error::Transport { .. }
                | Error::Protocol { .. }
                | Error::Timeout { .. }
                | Error::Disconnected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::transport("socket reset");
        assert_eq!(err.to_string(), "Bridge transport error: socket reset");

        let err = Error::timeout("Bridge acquisition", 4000);
        assert_eq!(err.to_string(), "Bridge acquisition timed out after 4000ms");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_bridge_failures() {
        assert!(Error::bridge_unavailable("no host").is_bridge_failure());
        assert!(Error::timeout("render", 10).is_bridge_failure());
        assert!(Error::Disconnected.is_bridge_failure());
        assert!(!Error::layout("duplicate id").is_bridge_failure());
        assert!(!Error::unknown_app("x").is_bridge_failure());
    }
}
