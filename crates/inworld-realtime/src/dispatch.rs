//! Inbound frame parsing and routing.
//!
//! Control-plane packets (scene loaded, interaction end, warnings) are consumed
//! by the client. Everything else is forwarded to subscribers.

use crate::{error::ClientError, events::ReceivedPacket, registry::LiveSessionRegistry};
use inworld_realtime_types::{
    CharacterData, ControlAction, InworldError, Packet, PacketType, Payload, ServerFrame,
};
use tracing::{trace, warn};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Packet(Packet),
    Error(InworldError),
}

/// Where a received packet goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// The server confirmed the loaded scene and its agents.
    SessionLoaded(Vec<CharacterData>),
    /// The interaction with this id is finished.
    InteractionEnd(String),
    Warning(String),
    Forward(Packet),
}

pub fn parse_frame(text: &str) -> Result<Inbound, ClientError> {
    let frame: ServerFrame = serde_json::from_str(text)?;
    if let Some(error) = frame.error.filter(InworldError::is_valid) {
        return Ok(Inbound::Error(error));
    }
    match frame.result {
        Some(packet) => Ok(Inbound::Packet(packet)),
        None => Err(ClientError::UnexpectedFrame(text.to_string())),
    }
}

pub fn route(packet: Packet) -> Route {
    if packet.is_control(ControlAction::InteractionEnd) {
        return Route::InteractionEnd(packet.interaction_id().to_string());
    }
    if packet.is_control(ControlAction::Warning) {
        let description = packet.as_control().and_then(|c| c.description.clone());
        return Route::Warning(description.unwrap_or_default());
    }
    match packet.payload {
        Payload::SessionResponse(response) => Route::SessionLoaded(response.into_agents()),
        payload => {
            if payload.kind() == PacketType::Unknown {
                warn!(packet_id = %packet.packet_id.packet_id, "Received unknown packet");
            }
            Route::Forward(Packet { payload, ..packet })
        }
    }
}

/// Attaches the sending character, found by its agent id.
pub fn attribute(packet: Packet, registry: &LiveSessionRegistry) -> ReceivedPacket {
    let source = registry.by_agent_id(&packet.routing.source.name).cloned();
    trace!(
        kind = ?packet.kind(),
        source = source.as_ref().map(|c| c.given_name.as_str()).unwrap_or("-"),
        "Forwarding packet"
    );
    ReceivedPacket { packet, source }
}

/// Packets sent by the world/session itself rather than a character.
pub fn is_global(packet: &Packet) -> bool {
    packet.routing.source.is_world()
}

/// The server closes idle sessions with an error mentioning inactivity.
pub fn is_inactivity(error: &InworldError) -> bool {
    error.message.to_lowercase().contains("inactivity")
}
