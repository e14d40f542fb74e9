//! Configuration types for lensmirror
//!
//! Defines `Settings` (config.toml) and its sections. Every field has a
//! default so a partial or missing file still yields a usable configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::apps::AppKind;

/// Application settings (config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub bridge: BridgeSettings,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub ui: UiSettings,

    #[serde(default)]
    pub restapi: RestApiSettings,

    #[serde(default)]
    pub notif: NotifSettings,

    /// Per-app overrides keyed by app name (`[apps.timer]`).
    #[serde(default)]
    pub apps: HashMap<String, AppOverrides>,
}

impl Settings {
    /// Connect budget for an app: explicit override, then the app's own
    /// default, then the bridge-wide default.
    pub fn connect_timeout_for(&self, kind: AppKind) -> Duration {
        let millis = self
            .apps
            .get(kind.name())
            .and_then(|o| o.connect_timeout_ms)
            .or_else(|| kind.default_connect_timeout_ms())
            .unwrap_or(self.bridge.connect_timeout_ms);
        Duration::from_millis(millis)
    }
}

/// Display bridge settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeSettings {
    /// WebSocket URL of the display hub
    #[serde(default = "default_bridge_url")]
    pub url: String,

    /// Default acquisition budget in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Per-request timeout for render calls
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8765/hub".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    4000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

/// Reconnect after an abnormal bridge exit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// At most one reconnect is scheduled per cooldown window
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Delay between the disconnect and the reconnect attempt
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: default_cooldown_ms(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cooldown_ms() -> u64 {
    5000
}

fn default_delay_ms() -> u64 {
    3000
}

/// Local mirror settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UiSettings {
    /// Number of event log lines kept (newest first)
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_log_capacity() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RestApiSettings {
    #[serde(default = "default_http_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for RestApiSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_http_timeout_ms(),
        }
    }
}

fn default_http_timeout_ms() -> u64 {
    8000
}

/// Notification viewer settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifSettings {
    /// Server-sent event stream of the notification relay, e.g.
    /// `http://127.0.0.1:3000/api/notif/stream`. Unset means notifications
    /// only arrive through the `notify` control.
    #[serde(default)]
    pub relay_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppOverrides {
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.bridge.connect_timeout_ms, 4000);
        assert_eq!(settings.reconnect.cooldown_ms, 5000);
        assert_eq!(settings.reconnect.delay_ms, 3000);
        assert_eq!(settings.ui.log_capacity, 200);
        assert_eq!(settings.notif.relay_url, None);
    }

    #[test]
    fn test_notif_relay_url() {
        let settings: Settings = toml::from_str(
            r#"
[notif]
relay_url = "http://127.0.0.1:3000/api/notif/stream"
"#,
        )
        .unwrap();
        assert_eq!(
            settings.notif.relay_url.as_deref(),
            Some("http://127.0.0.1:3000/api/notif/stream")
        );
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[bridge]
url = "ws://glasses.local:9000/hub"

[apps.clock]
connect_timeout_ms = 1500
"#,
        )
        .unwrap();
        assert_eq!(settings.bridge.url, "ws://glasses.local:9000/hub");
        assert_eq!(settings.bridge.connect_timeout_ms, 4000);
        assert_eq!(
            settings.connect_timeout_for(AppKind::Clock),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_connect_timeout_per_app_defaults() {
        let settings = Settings::default();
        assert_eq!(
            settings.connect_timeout_for(AppKind::Timer),
            Duration::from_millis(6000)
        );
        assert_eq!(
            settings.connect_timeout_for(AppKind::Quicktest),
            Duration::from_millis(10_000)
        );
        assert_eq!(
            settings.connect_timeout_for(AppKind::Base),
            Duration::from_millis(4000)
        );
    }
}
