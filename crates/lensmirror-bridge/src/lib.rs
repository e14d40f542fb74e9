//! # lensmirror-bridge - Display Bridge Layer
//!
//! Everything that talks to the remote display: the [`DisplayTransport`]
//! trait, the bridge/mock [`DisplayClient`], the bounded-time
//! [`ConnectionSelector`] and the WebSocket [`HubConnector`].
//!
//! ## Test helpers
//!
//! With the `test-helpers` feature, [`test_utils`] exposes a scripted
//! transport and connector for driving render and connect paths in tests.

pub mod client;
pub mod connect;
pub mod hub;
pub mod protocol;
pub mod transport;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use client::{DisplayClient, DisplayMode, MockDisplay};
pub use connect::{ConnectOutcome, ConnectionSelector};
pub use hub::{ConnectionState, HubConnector, HubTransport};
pub use transport::{BridgeLink, Connector, DisplayTransport, LocalDisplayTransport};
