//! Best-effort key/value preferences
//!
//! Small derived values (timer presets, clock position, notification
//! allow-list, REST commands) survive restarts through `preferences.toml`.
//! Nothing here can fail the caller: unreadable files and failed writes are
//! logged and the in-memory value stays authoritative.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use lensmirror_core::prelude::*;

use crate::config::settings::CONFIG_DIR_NAME;

pub const PREFERENCES_FILENAME: &str = "preferences.toml";

pub const KEY_TIMER_PRESETS: &str = "timer.presets";
pub const KEY_CLOCK_TIME_X: &str = "clock.time_x";
pub const KEY_NOTIF_ALLOWED_APPS: &str = "notif.allowed_apps";
pub const KEY_RESTAPI_COMMANDS: &str = "restapi.commands";

#[derive(Debug)]
enum Backend {
    File(PathBuf),
    Memory,
}

#[derive(Debug)]
pub struct Preferences {
    backend: Backend,
    values: Mutex<toml::Table>,
}

impl Preferences {
    /// Preferences that live only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory,
            values: Mutex::new(toml::Table::new()),
        }
    }

    /// Preferences backed by `path`. A missing or malformed file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => content.parse::<toml::Table>().unwrap_or_else(|e| {
                warn!("Ignoring malformed preferences {:?}: {}", path, e);
                toml::Table::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => {
                warn!("Failed to read preferences {:?}: {}", path, e);
                toml::Table::new()
            }
        };
        Self {
            backend: Backend::File(path),
            values: Mutex::new(values),
        }
    }

    /// `<config dir>/lensmirror/preferences.toml`, or in-memory when the
    /// platform has no config directory.
    pub fn open_default() -> Self {
        match dirs::config_dir() {
            Some(dir) => Self::open(dir.join(CONFIG_DIR_NAME).join(PREFERENCES_FILENAME)),
            None => {
                warn!("No config directory, preferences will not persist");
                Self::in_memory()
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(p) => Some(p),
            Backend::Memory => None,
        }
    }

    /// Value stored under `key`, or `None` when absent or of the wrong shape.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.table().get(key).cloned()?;
        match value.try_into() {
            Ok(v) => Some(v),
            Err(e) => {
                debug!("Preference {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store `value` under `key` and persist. Failures are logged only.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        let value = match toml::Value::try_from(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("Cannot store preference {}: {}", key, e);
                return;
            }
        };

        let snapshot = {
            let mut table = self.table();
            table.insert(key.to_string(), value);
            table.clone()
        };

        if let Backend::File(path) = &self.backend {
            if let Err(e) = write_table(path, &snapshot) {
                warn!("Failed to persist preference {}: {}", key, e);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        let snapshot = {
            let mut table = self.table();
            if table.remove(key).is_none() {
                return;
            }
            table.clone()
        };
        if let Backend::File(path) = &self.backend {
            if let Err(e) = write_table(path, &snapshot) {
                warn!("Failed to persist removal of {}: {}", key, e);
            }
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, toml::Table> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Atomic write under an exclusive lock on a sidecar file.
fn write_table(path: &Path, table: &toml::Table) -> Result<()> {
    let content = toml::to_string_pretty(table)
        .map_err(|e| Error::config(format!("Failed to serialize preferences: {}", e)))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::config(format!("Invalid preferences path {:?}", path)))?;
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::config(format!("Failed to create {:?}: {}", dir, e)))?;

    let lock = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(dir.join(".preferences.lock"))
        .map_err(|e| Error::config(format!("Failed to open preferences lock: {}", e)))?;
    lock.lock_exclusive()
        .map_err(|e| Error::config(format!("Failed to lock preferences: {}", e)))?;

    let temp_path = dir.join(".preferences.toml.tmp");
    let mut file = std::fs::File::create(&temp_path)
        .map_err(|e| Error::config(format!("Failed to create temp file: {}", e)))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::config(format!("Failed to write preferences: {}", e)))?;
    file.flush()
        .map_err(|e| Error::config(format!("Failed to flush preferences: {}", e)))?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    // Lock is released when `lock` is dropped
    trace!("Saved preferences to {:?}", path);
    Ok(())
}
