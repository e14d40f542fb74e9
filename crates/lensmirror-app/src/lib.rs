//! lensmirror-app - Session state, rendering and the demo apps
//!
//! Each demo app runs inside an [`Engine`]: one event loop that applies the
//! app's [`Update`]s to the local mirror surface and, through the
//! single-flight [`RenderCoalescer`], to the remote display. The display
//! client is chosen per connect by the bridge crate's `ConnectionSelector`,
//! so an unreachable bridge only ever means running against the mock.

pub mod action;
pub mod apps;
pub mod coalescer;
pub mod config;
pub mod engine;
pub mod engine_event;
pub mod jobs;
pub mod message;
pub mod mirror;
pub mod prefs;
pub mod reconnect;
pub mod relay;
pub mod session;
pub mod ticker;

// Re-export primary types
pub use action::LocalAction;
pub use apps::{App, AppContext, AppKind, DeviceEvent, Update};
pub use coalescer::{RenderCoalescer, RenderKind, RenderReport};
pub use config::Settings;
pub use engine::Engine;
pub use engine_event::EngineEvent;
pub use message::Message;
pub use mirror::{DualTargetMirror, MemoryMirror, MirrorRegion, MirrorSurface};
pub use prefs::Preferences;
pub use session::{Phase, SessionState};
