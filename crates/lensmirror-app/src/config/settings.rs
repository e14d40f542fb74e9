//! Settings file loading and initialization

use std::path::{Path, PathBuf};

use lensmirror_core::prelude::*;

use super::types::Settings;

pub const CONFIG_DIR_NAME: &str = "lensmirror";
pub const CONFIG_FILENAME: &str = "config.toml";

/// `~/.config/lensmirror/config.toml` (platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
}

/// Load settings from `path`, or from the default location.
///
/// Missing or malformed files are logged and yield defaults.
pub fn load_settings(path: Option<&Path>) -> Settings {
    let config_path = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(p) => p,
        None => {
            debug!("No config directory available, using default settings");
            return Settings::default();
        }
    };

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Write a commented default config file if none exists.
pub fn init_config_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::config(format!("Failed to create config dir: {}", e)))?;
    }

    let default_content = r#"# lensmirror configuration

[bridge]
url = "ws://127.0.0.1:8765/hub"
connect_timeout_ms = 4000     # acquisition budget before falling back to mock
request_timeout_ms = 5000

[reconnect]
enabled = true
cooldown_ms = 5000            # at most one reconnect per window
delay_ms = 3000

[ui]
log_capacity = 200

[restapi]
request_timeout_ms = 8000

[notif]
# relay_url = "http://127.0.0.1:3000/api/notif/stream"

# Per-app overrides
# [apps.timer]
# connect_timeout_ms = 6000
"#;

    std::fs::write(path, default_content)
        .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
    info!("Created default config at {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_settings(Some(&dir.path().join("absent.toml")));
        assert_eq!(settings.bridge.connect_timeout_ms, 4000);
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[bridge\nurl = ").unwrap();
        let settings = load_settings(Some(&path));
        assert_eq!(settings.ui.log_capacity, 200);
    }

    #[test]
    fn test_init_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);
        init_config_file(&path).unwrap();
        assert!(path.exists());

        let settings = load_settings(Some(&path));
        assert_eq!(settings.bridge.url, "ws://127.0.0.1:8765/hub");
        assert!(settings.reconnect.enabled);
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[ui]\nlog_capacity = 5\n").unwrap();
        init_config_file(&path).unwrap();
        assert_eq!(load_settings(Some(&path)).ui.log_capacity, 5);
    }
}
