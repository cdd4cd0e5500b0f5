//! Relay core: who may send, how a multi-recipient message is composed, and
//! how a confirmed message is fanned out.
//!
//! - [`permissions`] resolves roles and guards role grants.
//! - [`session`] holds the per-initiator composition state machine.
//! - [`broadcast`] delivers a confirmed message through a [`Transport`].

pub mod broadcast;
pub mod error;
pub mod permissions;
pub mod session;
pub mod transport;

pub use broadcast::{BroadcastEngine, BroadcastHandle, EngineConfig, SendRequest};
pub use error::{RelayError, Result};
pub use permissions::Permissions;
pub use session::{Composer, Session};
pub use transport::{OutgoingMessage, Transport, TransportError};
