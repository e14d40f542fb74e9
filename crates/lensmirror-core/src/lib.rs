//! # lensmirror-core - Core Domain Types
//!
//! Foundation crate for lensmirror. Provides the error type, logging setup,
//! device event normalization, list-selection resolution and the remote page
//! model. It has no internal dependencies.
//!
//! ## Public API
//!
//! ### Events (`events`)
//! - [`RawDeviceEvent`] - Loosely typed event payload as delivered by the bridge
//! - [`CanonicalGesture`] - Closed gesture set (`Primary`, `SecondaryToggle`, `Previous`, `Next`, `Unknown`)
//! - [`normalize()`] - Total mapping from raw payload to gesture
//! - [`LifecycleSignal`] / [`lifecycle()`] - Foreground enter/exit and abnormal exit
//!
//! ### Selection (`selection`)
//! - [`SelectionHint`] - Range-checked index recovered from index or name fields
//! - [`resolve()`] - Next list selection for a gesture
//!
//! ### Page model (`page`)
//! - [`PageDescription`], [`Element`], [`ElementId`], [`Rect`]
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Error enum grouped by layer, with a bridge-failure classifier
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! ```rust
//! use lensmirror_core::prelude::*;
//! ```

pub mod duration;
pub mod error;
pub mod events;
pub mod logging;
pub mod page;
pub mod prelude;
pub mod selection;

pub use duration::{format_duration_clock, parse_duration_label, parse_minute_second};
pub use error::{Error, Result};
pub use events::{lifecycle, normalize, CanonicalGesture, LifecycleSignal, RawDeviceEvent};
pub use page::{
    Element, ElementId, ListElement, PageDescription, Rect, TextElement, DISPLAY_HEIGHT,
    DISPLAY_WIDTH,
};
pub use selection::{clamp_index, match_label, resolve, SelectionHint};
