//! Wire data model shared by the Inworld realtime session client.
//!
//! Nothing in this crate performs I/O: it only describes packets, addressing,
//! characters, tokens and the error objects the server returns.

pub mod entities;
pub mod error;
pub mod packet;
pub mod routing;
pub mod token;

pub use entities::{
    Capabilities, CharacterData, ClientInfo, Continuation, ContinuationType, Feedback,
    FeedbackData, SessionState, UserRequest,
};
pub use error::{ErrorDetail, ErrorType, InworldError, ReconnectionType};
pub use packet::{ControlAction, Packet, PacketId, PacketType, Payload, ServerFrame};
pub use routing::{Actor, ActorType, Routing, Target};
pub use token::{AccessTokenRequest, Token};
