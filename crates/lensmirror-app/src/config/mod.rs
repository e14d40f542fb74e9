//! Configuration file parsing for lensmirror
//!
//! Supports:
//! - `config.toml` - Bridge, reconnect, UI, REST, notification relay and
//!   per-app settings

pub mod settings;
pub mod types;

pub use settings::{default_config_path, init_config_file, load_settings};
pub use types::*;
