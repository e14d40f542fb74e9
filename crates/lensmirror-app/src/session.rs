//! Per-app session state
//!
//! One `SessionState` is owned by each running engine. It carries the
//! pieces every app shares (display mode, phase, status line, event log);
//! app-specific payload lives in the app itself.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;

use lensmirror_bridge::DisplayMode;
use lensmirror_core::{clamp_index, resolve, CanonicalGesture, SelectionHint};

/// Coarse lifecycle shown next to the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Mock,
    Running,
    Error,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Connecting => "connecting",
            Phase::Connected => "connected",
            Phase::Mock => "mock",
            Phase::Running => "running",
            Phase::Error => "error",
        }
    }

    /// Phase reached after a connect resolves in `mode`.
    pub fn for_mode(mode: DisplayMode) -> Self {
        match mode {
            DisplayMode::Bridge => Phase::Connected,
            DisplayMode::Mock => Phase::Mock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub text: String,
}

/// Shared session state.
#[derive(Debug)]
pub struct SessionState {
    /// `None` until the first connect resolves
    pub mode: Option<DisplayMode>,
    pub phase: Phase,
    pub status: String,
    /// A connect is in flight; further connect requests are ignored
    pub connecting: bool,
    log: VecDeque<LogLine>,
    log_capacity: usize,
}

impl SessionState {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            mode: None,
            phase: Phase::Idle,
            status: String::new(),
            connecting: false,
            log: VecDeque::new(),
            log_capacity: log_capacity.max(1),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.mode.is_some()
    }

    /// Prepend a log line, dropping the oldest beyond capacity.
    pub fn push_log(&mut self, at: DateTime<Local>, text: impl Into<String>) -> &LogLine {
        self.log.push_front(LogLine {
            at,
            text: text.into(),
        });
        self.log.truncate(self.log_capacity);
        &self.log[0]
    }

    /// Log lines, newest first.
    pub fn log(&self) -> impl Iterator<Item = &LogLine> {
        self.log.iter()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }
}

/// A list of option labels plus the selected row.
///
/// `selected` always stays inside `0..options.len()` (0 when empty).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSelection {
    options: Vec<String>,
    selected: usize,
}

impl ListSelection {
    pub fn new(options: Vec<String>) -> Self {
        Self {
            options,
            selected: 0,
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_label(&self) -> Option<&str> {
        self.options.get(self.selected).map(String::as_str)
    }

    /// Replace the options, keeping the selection in range.
    pub fn set_options(&mut self, options: Vec<String>) {
        self.options = options;
        self.selected = clamp_index(self.selected, self.options.len());
    }

    pub fn select(&mut self, index: usize) {
        self.selected = clamp_index(index, self.options.len());
    }

    /// Resolve a gesture against this list and adopt the result.
    pub fn apply(&mut self, gesture: CanonicalGesture, hint: SelectionHint, list_shaped: bool) -> usize {
        self.selected = resolve(gesture, hint, self.selected, self.options.len(), list_shaped);
        self.selected
    }
}
