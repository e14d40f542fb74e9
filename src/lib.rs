//! lensmirror library
//!
//! Headless front end for the demo apps: mirror writes and engine events go
//! to stdout as NDJSON, local controls are read from stdin.

pub mod headless;
pub mod signals;

// Re-export main entry points
pub use headless::runner::{run_headless, HeadlessOptions};
