//! The wire packet envelope and its payload variants.
//!
//! On the wire a packet is a flat JSON object with a `type`, identity, routing
//! and exactly one populated payload field (`text`, `dataChunk`, `control`, ...).
//! In memory the payload is a single [`Payload`] enum, so the packet type is
//! derived from it and can never disagree with it.

use crate::entities::{Capabilities, CharacterData, ClientInfo, Continuation, UserRequest};
use crate::error::InworldError;
use crate::routing::{Actor, Routing};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a packet plus the ids that group it into a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketId {
    #[serde(default)]
    pub packet_id: String,
    #[serde(default)]
    pub utterance_id: String,
    #[serde(default)]
    pub interaction_id: String,
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl PacketId {
    /// A fresh id with a random packet id and no grouping.
    pub fn new() -> Self {
        Self {
            packet_id: uuid::Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PacketType {
    Text,
    Audio,
    Action,
    Custom,
    Control,
    Mutation,
    Emotion,
    SessionResponse,
    SessionControl,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    SpeechToText,
    #[default]
    TypedIn,
    Generated,
    Filler,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextEvent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(rename = "final", default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    #[default]
    Audio,
    State,
    #[serde(other)]
    Unspecified,
}

/// A base64 encoded chunk of binary data, usually PCM16 audio.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChunk {
    #[serde(default)]
    pub chunk: String,
    #[serde(rename = "type", default)]
    pub kind: DataType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarratedAction {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    #[serde(default)]
    pub narrated_action: NarratedAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerParameter {
    pub name: String,
    pub value: String,
}

/// A custom event. Outbound this is a trigger, inbound the server may echo one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEvent {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<TriggerParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlAction {
    AudioSessionStart,
    AudioSessionEnd,
    InteractionEnd,
    Warning,
    ConversationUpdate,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationUpdate {
    #[serde(default)]
    pub participants: Vec<Actor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlEvent {
    pub action: ControlAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_update: Option<ConversationUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponses {
    #[serde(default)]
    pub interaction_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utterance_id: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadScene {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_responses: Option<CancelResponses>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_scene: Option<LoadScene>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionEvent {
    #[serde(default)]
    pub behavior: String,
    #[serde(default)]
    pub strength: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedAgents {
    #[serde(default)]
    pub agents: Vec<CharacterData>,
}

/// The server's confirmation that a scene (or a set of characters) is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionControlResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_scene: Option<LoadedAgents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_characters: Option<LoadedAgents>,
}

impl SessionControlResponse {
    /// Agents from both the scene and the character lists, scene first.
    pub fn into_agents(self) -> Vec<CharacterData> {
        self.loaded_scene
            .into_iter()
            .chain(self.loaded_characters)
            .flat_map(|loaded| loaded.agents)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfiguration {
    pub game_session_id: String,
}

/// One piece of session configuration sent during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionControlEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities_configuration: Option<Capabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_configuration: Option<SessionConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_configuration: Option<ClientInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_configuration: Option<UserRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation: Option<Continuation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(TextEvent),
    Audio(DataChunk),
    Action(ActionEvent),
    Custom(CustomEvent),
    Control(ControlEvent),
    Mutation(MutationEvent),
    Emotion(EmotionEvent),
    SessionResponse(SessionControlResponse),
    SessionControl(SessionControlEvent),
    Unknown,
}

impl Payload {
    pub fn kind(&self) -> PacketType {
        match self {
            Payload::Text(_) => PacketType::Text,
            Payload::Audio(_) => PacketType::Audio,
            Payload::Action(_) => PacketType::Action,
            Payload::Custom(_) => PacketType::Custom,
            Payload::Control(_) => PacketType::Control,
            Payload::Mutation(_) => PacketType::Mutation,
            Payload::Emotion(_) => PacketType::Emotion,
            Payload::SessionResponse(_) => PacketType::SessionResponse,
            Payload::SessionControl(_) => PacketType::SessionControl,
            Payload::Unknown => PacketType::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WirePacket", into = "WirePacket")]
pub struct Packet {
    pub timestamp: DateTime<Utc>,
    pub packet_id: PacketId,
    pub routing: Routing,
    pub payload: Payload,
}

impl Packet {
    /// A player-originated packet with a fresh id and no targets yet.
    pub fn new(payload: Payload) -> Self {
        Self {
            timestamp: Utc::now(),
            packet_id: PacketId::new(),
            routing: Routing::from_player(),
            payload,
        }
    }

    /// A player packet addressed to the world.
    fn addressed_to_world(payload: Payload) -> Self {
        let mut packet = Self::new(payload);
        packet.routing.targets.push(Actor::world());
        packet
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Payload::Text(TextEvent {
            text: text.into(),
            source_type: SourceType::TypedIn,
            is_final: true,
        }))
    }

    pub fn audio(chunk: impl Into<String>) -> Self {
        Self::new(Payload::Audio(DataChunk {
            chunk: chunk.into(),
            kind: DataType::Audio,
        }))
    }

    pub fn control(action: ControlAction) -> Self {
        Self::new(Payload::Control(ControlEvent {
            action,
            description: None,
            conversation_update: None,
        }))
    }

    /// Control packet announcing the participants of a conversation.
    /// Participants are filled with resolved agents when the packet is sent.
    pub fn conversation_update() -> Self {
        Self::new(Payload::Control(ControlEvent {
            action: ControlAction::ConversationUpdate,
            description: None,
            conversation_update: Some(ConversationUpdate::default()),
        }))
    }

    pub fn trigger<I, K, V>(name: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(Payload::Custom(CustomEvent {
            name: name.into(),
            parameters: parameters
                .into_iter()
                .map(|(name, value)| TriggerParameter {
                    name: name.into(),
                    value: value.into(),
                })
                .collect(),
        }))
    }

    pub fn cancel_responses(interaction_id: impl Into<String>, utterance_ids: Vec<String>) -> Self {
        Self::new(Payload::Mutation(MutationEvent {
            cancel_responses: Some(CancelResponses {
                interaction_id: interaction_id.into(),
                utterance_id: utterance_ids,
            }),
            load_scene: None,
        }))
    }

    pub fn load_scene(scene_name: impl Into<String>) -> Self {
        Self::addressed_to_world(Payload::Mutation(MutationEvent {
            cancel_responses: None,
            load_scene: Some(LoadScene {
                name: scene_name.into(),
            }),
        }))
    }

    pub fn session_control(event: SessionControlEvent) -> Self {
        Self::addressed_to_world(Payload::SessionControl(event))
    }

    pub fn kind(&self) -> PacketType {
        self.payload.kind()
    }

    pub fn interaction_id(&self) -> &str {
        &self.packet_id.interaction_id
    }

    pub fn as_text(&self) -> Option<&TextEvent> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_control(&self) -> Option<&ControlEvent> {
        match &self.payload {
            Payload::Control(control) => Some(control),
            _ => None,
        }
    }

    /// True for a control packet carrying `action`.
    pub fn is_control(&self, action: ControlAction) -> bool {
        self.as_control().is_some_and(|c| c.action == action)
    }
}

/// Flat JSON shape of a packet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePacket {
    #[serde(default)]
    timestamp: DateTime<Utc>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<PacketType>,
    #[serde(default)]
    packet_id: PacketId,
    #[serde(default)]
    routing: Routing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<TextEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_chunk: Option<DataChunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<ActionEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom: Option<CustomEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    control: Option<ControlEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mutation: Option<MutationEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotion: Option<EmotionEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_control_response: Option<SessionControlResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_control: Option<SessionControlEvent>,
}

impl From<WirePacket> for Packet {
    fn from(wire: WirePacket) -> Self {
        // The server does not always send `type`, so the populated field decides.
        let payload = if let Some(text) = wire.text {
            Payload::Text(text)
        } else if let Some(chunk) = wire.data_chunk {
            Payload::Audio(chunk)
        } else if let Some(action) = wire.action {
            Payload::Action(action)
        } else if let Some(custom) = wire.custom {
            Payload::Custom(custom)
        } else if let Some(control) = wire.control {
            Payload::Control(control)
        } else if let Some(mutation) = wire.mutation {
            Payload::Mutation(mutation)
        } else if let Some(emotion) = wire.emotion {
            Payload::Emotion(emotion)
        } else if let Some(response) = wire.session_control_response {
            Payload::SessionResponse(response)
        } else if let Some(session) = wire.session_control {
            Payload::SessionControl(session)
        } else {
            Payload::Unknown
        };
        Packet {
            timestamp: wire.timestamp,
            packet_id: wire.packet_id,
            routing: wire.routing,
            payload,
        }
    }
}

impl From<Packet> for WirePacket {
    fn from(packet: Packet) -> Self {
        let mut wire = WirePacket {
            timestamp: packet.timestamp,
            kind: Some(packet.payload.kind()),
            packet_id: packet.packet_id,
            routing: packet.routing,
            ..Default::default()
        };
        match packet.payload {
            Payload::Text(text) => wire.text = Some(text),
            Payload::Audio(chunk) => wire.data_chunk = Some(chunk),
            Payload::Action(action) => wire.action = Some(action),
            Payload::Custom(custom) => wire.custom = Some(custom),
            Payload::Control(control) => wire.control = Some(control),
            Payload::Mutation(mutation) => wire.mutation = Some(mutation),
            Payload::Emotion(emotion) => wire.emotion = Some(emotion),
            Payload::SessionResponse(response) => wire.session_control_response = Some(response),
            Payload::SessionControl(session) => wire.session_control = Some(session),
            Payload::Unknown => {}
        }
        wire
    }
}

/// Envelope of every inbound frame: either a packet or an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerFrame {
    #[serde(default)]
    pub result: Option<Packet>,
    #[serde(default)]
    pub error: Option<InworldError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::ActorType;
    use serde_json::{Value, json};

    #[test]
    fn test_text_packet_wire_shape() {
        let mut packet = Packet::text("hello");
        packet.routing.targets.push(Actor::agent("agent-1"));
        let value: Value = serde_json::to_value(&packet).unwrap();

        assert_eq!(value["type"], "TEXT");
        assert_eq!(value["text"]["text"], "hello");
        assert_eq!(value["text"]["sourceType"], "TYPED_IN");
        assert_eq!(value["text"]["final"], true);
        assert_eq!(value["routing"]["source"]["type"], "PLAYER");
        assert_eq!(value["routing"]["targets"][0]["name"], "agent-1");
        assert!(value.get("dataChunk").is_none());
        assert!(!value["packetId"]["packetId"].as_str().unwrap().is_empty());
        assert!(value["packetId"].get("conversationId").is_none());
    }

    #[test]
    fn test_payload_inferred_without_type() {
        let raw = json!({
            "timestamp": "2024-01-02T03:04:05Z",
            "packetId": {"packetId": "p1", "interactionId": "i1", "utteranceId": "u1"},
            "routing": {"source": {"type": "AGENT", "name": "a1"}, "targets": [{"type": "PLAYER"}]},
            "emotion": {"behavior": "JOY", "strength": "STRONG"}
        });
        let packet: Packet = serde_json::from_value(raw).unwrap();
        assert_eq!(packet.kind(), PacketType::Emotion);
        assert_eq!(packet.interaction_id(), "i1");
        assert_eq!(packet.routing.source.kind, ActorType::Agent);
        assert_eq!(packet.routing.targets[0].name, "");
    }

    #[test]
    fn test_unknown_payload() {
        let packet: Packet = serde_json::from_str(r#"{"type":"LATENCY_REPORT","latencyReport":{}}"#)
            .unwrap();
        assert_eq!(packet.kind(), PacketType::Unknown);
        assert_eq!(packet.payload, Payload::Unknown);
    }

    #[test]
    fn test_control_action_catch_all() {
        let packet: Packet =
            serde_json::from_str(r#"{"control":{"action":"TTS_PLAYBACK_MUTE"}}"#).unwrap();
        assert_eq!(packet.as_control().unwrap().action, ControlAction::Unknown);

        let packet: Packet = serde_json::from_str(
            r#"{"control":{"action":"WARNING","description":"slow down"}}"#,
        )
        .unwrap();
        assert!(packet.is_control(ControlAction::Warning));
        assert_eq!(
            packet.as_control().unwrap().description.as_deref(),
            Some("slow down")
        );
    }

    #[test]
    fn test_session_response_agents() {
        let raw = json!({
            "sessionControlResponse": {
                "loadedScene": {"agents": [{"agentId": "a1", "brainName": "workspaces/w/characters/one"}]},
                "loadedCharacters": {"agents": [{"agentId": "a2", "brainName": "workspaces/w/characters/two"}]}
            }
        });
        let packet: Packet = serde_json::from_value(raw).unwrap();
        let Payload::SessionResponse(response) = packet.payload else {
            panic!("expected a session response");
        };
        let agents = response.into_agents();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].agent_id, "a1");
        assert_eq!(agents[1].brain_name, "workspaces/w/characters/two");
    }

    #[test]
    fn test_trigger_and_cancel_constructors() {
        let trigger = Packet::trigger("greet", [("mood", "happy")]);
        let value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(value["type"], "CUSTOM");
        assert_eq!(value["custom"]["name"], "greet");
        assert_eq!(value["custom"]["parameters"][0]["value"], "happy");

        let cancel = Packet::cancel_responses("i1", vec!["u1".into(), "u2".into()]);
        let value = serde_json::to_value(&cancel).unwrap();
        assert_eq!(value["type"], "MUTATION");
        assert_eq!(value["mutation"]["cancelResponses"]["interactionId"], "i1");
        assert_eq!(value["mutation"]["cancelResponses"]["utteranceId"][1], "u2");
    }

    #[test]
    fn test_world_addressed_constructors() {
        let load = Packet::load_scene("workspaces/w/scenes/s");
        assert!(load.routing.targets[0].is_world());
        let value = serde_json::to_value(&load).unwrap();
        assert_eq!(value["mutation"]["loadScene"]["name"], "workspaces/w/scenes/s");

        let session = Packet::session_control(SessionControlEvent {
            session_configuration: Some(SessionConfiguration {
                game_session_id: "player:s1:abcdefgh".into(),
            }),
            ..Default::default()
        });
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["type"], "SESSION_CONTROL");
        assert_eq!(
            value["sessionControl"]["sessionConfiguration"]["gameSessionId"],
            "player:s1:abcdefgh"
        );
        assert!(value["sessionControl"].get("continuation").is_none());
    }

    #[test]
    fn test_server_frame_variants() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"result":{"text":{"text":"hi","final":false}}}"#).unwrap();
        assert_eq!(frame.result.unwrap().as_text().unwrap().text, "hi");

        let frame: ServerFrame =
            serde_json::from_str(r#"{"error":{"code":5,"message":"not found"}}"#).unwrap();
        assert!(frame.result.is_none());
        assert_eq!(frame.error.unwrap().code, 5);
    }

    #[test]
    fn test_packet_ids_are_unique() {
        assert_ne!(PacketId::new().packet_id, PacketId::new().packet_id);
    }
}
