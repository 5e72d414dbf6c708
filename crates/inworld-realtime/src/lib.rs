//! Inworld Realtime Session Client
//!
//! Connects a game to the Inworld character runtime over a WebSocket session:
//! token exchange, session handshake, an outgoing queue pumped on a fixed tick,
//! reconnect backoff, inbound dispatch to subscribers, and tracking of the live
//! characters and the audio/conversation target.
//!
//! [`InworldClient`] owns all session state on its own task. Applications talk
//! to it through a cloneable [`ClientHandle`] and observe it through
//! [`ClientEvents`].

pub mod audio_utils;
pub mod auth;
pub mod backoff;
pub mod client;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod queue;
pub mod registry;
pub mod rest;
pub mod transport;

pub use client::{ClientHandle, Collaborators, ConnectionStatus, InworldClient};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use error::ClientError;
pub use events::{ClientEvents, Observers, ReceivedPacket, SubscriptionId};
pub use inworld_realtime_types as types;
