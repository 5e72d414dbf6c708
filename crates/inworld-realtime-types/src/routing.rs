//! Packet addressing.
//!
//! Two layers live here: the wire [`Routing`] carried by every packet, and the
//! logical [`Target`] that callers use to say who a packet is for. A `Target`
//! names characters by their stable full name ("brain name"); the client turns
//! it into wire routing, which only carries ephemeral agent ids, right before
//! the packet is sent.

use serde::{Deserialize, Serialize};

/// The kind of participant on either end of a packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorType {
    Player,
    Agent,
    World,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One endpoint of a packet: the player, a character (by agent id) or the world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type", default)]
    pub kind: ActorType,
    #[serde(default)]
    pub name: String,
}

impl Actor {
    pub fn player() -> Self {
        Self {
            kind: ActorType::Player,
            name: String::new(),
        }
    }

    pub fn world() -> Self {
        Self {
            kind: ActorType::World,
            name: String::new(),
        }
    }

    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self {
            kind: ActorType::Agent,
            name: agent_id.into(),
        }
    }

    pub fn is_world(&self) -> bool {
        self.kind == ActorType::World
    }
}

/// Wire routing: who sent the packet and who it is addressed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    #[serde(default)]
    pub source: Actor,
    #[serde(default)]
    pub targets: Vec<Actor>,
}

impl Routing {
    /// Routing for a packet originating from the local player, targets unresolved.
    pub fn from_player() -> Self {
        Self {
            source: Actor::player(),
            targets: Vec::new(),
        }
    }
}

/// Logical destination of an outgoing packet.
///
/// Single-character and multi-character addressing share this one type rather
/// than two parallel send APIs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The world/session itself (scene mutations, session configuration, world triggers).
    World,
    /// A character addressed directly by its live-session agent id (legacy addressing).
    Agent(String),
    /// A single character by full name.
    Character(String),
    /// Several characters by full name, broadcast.
    Characters(Vec<String>),
    /// A multi-party conversation with a stable id and its participants' full names.
    Conversation {
        id: String,
        participants: Vec<String>,
    },
}

impl Target {
    /// True when the target addresses characters but names none.
    pub fn is_empty(&self) -> bool {
        match self {
            Target::World => false,
            Target::Agent(id) => id.is_empty(),
            Target::Character(name) => name.is_empty(),
            Target::Characters(names) => names.iter().all(|n| n.is_empty()),
            Target::Conversation { participants, .. } => participants.iter().all(|n| n.is_empty()),
        }
    }

    /// Full names of the addressed characters, in order.
    pub fn full_names(&self) -> Vec<&str> {
        match self {
            Target::World | Target::Agent(_) => Vec::new(),
            Target::Character(name) => vec![name.as_str()],
            Target::Characters(names) => names.iter().map(String::as_str).collect(),
            Target::Conversation { participants, .. } => {
                participants.iter().map(String::as_str).collect()
            }
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Target::Conversation { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Builds a target from an optional list of characters: none or one name is a
    /// single-character target, several names a broadcast.
    pub fn from_names(names: Vec<String>) -> Self {
        match names.len() {
            0 => Target::World,
            1 => Target::Character(names.into_iter().next().unwrap_or_default()),
            _ => Target::Characters(names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_serialization() {
        let json = serde_json::to_string(&Actor::agent("abc-123")).unwrap();
        assert_eq!(json, r#"{"type":"AGENT","name":"abc-123"}"#);

        let parsed: Actor = serde_json::from_str(r#"{"type":"NARRATOR","name":"x"}"#).unwrap();
        assert_eq!(parsed.kind, ActorType::Unknown);
    }

    #[test]
    fn test_target_emptiness() {
        assert!(!Target::World.is_empty());
        assert!(Target::Character(String::new()).is_empty());
        assert!(Target::Characters(vec![]).is_empty());
        assert!(
            Target::Conversation {
                id: "c1".into(),
                participants: vec![]
            }
            .is_empty()
        );
        assert!(!Target::Character("workspaces/w/characters/bob".into()).is_empty());
    }

    #[test]
    fn test_target_from_names() {
        assert_eq!(Target::from_names(vec![]), Target::World);
        assert_eq!(
            Target::from_names(vec!["a".into()]),
            Target::Character("a".into())
        );
        assert_eq!(
            Target::from_names(vec!["a".into(), "b".into()]),
            Target::Characters(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_full_names_and_conversation_id() {
        let target = Target::Conversation {
            id: "conv".into(),
            participants: vec!["a".into(), "b".into()],
        };
        assert_eq!(target.full_names(), vec!["a", "b"]);
        assert_eq!(target.conversation_id(), Some("conv"));
        assert!(Target::Agent("id".into()).full_names().is_empty());
    }
}
