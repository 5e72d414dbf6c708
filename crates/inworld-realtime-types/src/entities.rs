//! Descriptive data exchanged during the session handshake and via REST.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A character as reported by the server when a scene is loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterData {
    /// Ephemeral id, valid only for the current session.
    #[serde(default)]
    pub agent_id: String,
    /// Stable full name, e.g. `workspaces/{ws}/characters/{name}`.
    #[serde(default)]
    pub brain_name: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<CharacterDescription>,
}

impl CharacterData {
    /// Short file-friendly name: `{character}_{workspace}` for a full name, else the name itself.
    pub fn file_name(&self) -> String {
        let parts: Vec<&str> = self.brain_name.split('/').collect();
        if parts.len() < 4 {
            self.brain_name.clone()
        } else {
            format!("{}_{}", parts[3], parts[1])
        }
    }
}

impl fmt::Display for CharacterData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ID: {}", self.given_name, self.brain_name, self.agent_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDescription {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nick_names: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub motivation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personality_adjectives: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub character_role: String,
}

/// Features the client asks the server to enable for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    pub audio: bool,
    pub emotions: bool,
    pub interruptions: bool,
    pub narrated_actions: bool,
    pub regenerate_response: bool,
    pub text: bool,
    pub triggers: bool,
    pub phoneme_info: bool,
    pub relations: bool,
    pub debug_info: bool,
    pub multi_agent: bool,
}

impl Capabilities {
    /// The set a conversational client normally wants.
    pub fn conversational() -> Self {
        Self {
            audio: true,
            emotions: true,
            interruptions: true,
            narrated_actions: true,
            text: true,
            triggers: true,
            phoneme_info: true,
            multi_agent: true,
            ..Default::default()
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.audio, "AUDIO"),
            (self.emotions, "EMOTIONS"),
            (self.interruptions, "INTERRUPTIONS"),
            (self.narrated_actions, "NARRATIVE"),
            (self.regenerate_response, "REGENERATE_RESPONSE"),
            (self.text, "TEXT"),
            (self.triggers, "TRIGGER"),
            (self.phoneme_info, "PHONEME"),
            (self.relations, "RELATIONS"),
            (self.debug_info, "DEBUG"),
            (self.multi_agent, "MULTI_AGENT"),
        ];
        let enabled: Vec<&str> = flags
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&enabled.join(" "))
    }
}

/// Identifies the SDK to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            id: "rust".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: String::new(),
        }
    }
}

impl fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfileField {
    pub field_id: String,
    pub field_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub fields: Vec<PlayerProfileField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(default)]
    pub view_transcript_consent: bool,
    #[serde(default)]
    pub player_profile: PlayerProfile,
}

/// The player as presented to the characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub user_settings: UserSettings,
}

impl UserRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: uuid::Uuid::new_v4().to_string(),
            user_settings: UserSettings {
                view_transcript_consent: true,
                player_profile: PlayerProfile::default(),
            },
        }
    }

    pub fn with_profile_field(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_settings.player_profile.fields.push(PlayerProfileField {
            field_id: id.into(),
            field_value: value.into(),
        });
        self
    }
}

impl fmt::Display for UserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.id)?;
        for field in &self.user_settings.player_profile.fields {
            write!(f, " {}: {}", field.field_id, field.field_value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContinuationType {
    #[default]
    #[serde(rename = "CONTINUATION_TYPE_UNKNOWN", alias = "UNKNOWN")]
    Unknown,
    #[serde(rename = "CONTINUATION_TYPE_EXTERNALLY_SAVED_STATE")]
    ExternallySavedState,
    #[serde(rename = "CONTINUATION_TYPE_DIALOG_HISTORY")]
    DialogHistory,
}

/// Prior session state the server should resume from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Continuation {
    #[serde(default)]
    pub continuation_type: ContinuationType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub externally_saved_state: String,
}

impl Continuation {
    pub fn saved_state(state: impl Into<String>) -> Self {
        Self {
            continuation_type: ContinuationType::ExternallySavedState,
            externally_saved_state: state.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.continuation_type != ContinuationType::Unknown && !self.externally_saved_state.is_empty()
    }
}

/// Player feedback on one interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub is_like: bool,
    #[serde(rename = "type", default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub comment: String,
    /// Server-assigned resource name, filled once the feedback is stored.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip)]
    pub interaction_id: String,
    #[serde(skip)]
    pub correlation_id: String,
}

impl Feedback {
    pub fn new(
        is_like: bool,
        interaction_id: impl Into<String>,
        correlation_id: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            is_like,
            kinds: Vec::new(),
            comment: comment.into(),
            name: String::new(),
            interaction_id: interaction_id.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn with_dislikes(mut self, dislikes: Vec<String>) -> Self {
        self.kinds = dislikes;
        self
    }
}

/// Feedback as echoed by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackData {
    #[serde(default)]
    pub is_like: bool,
    #[serde(rename = "type", default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub name: String,
}

/// Response body of the session state endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_file_name() {
        let character = CharacterData {
            brain_name: "workspaces/demo/characters/bob".into(),
            ..Default::default()
        };
        assert_eq!(character.file_name(), "bob_demo");

        let short = CharacterData {
            brain_name: "bob".into(),
            ..Default::default()
        };
        assert_eq!(short.file_name(), "bob");
    }

    #[test]
    fn test_capabilities_display_and_wire() {
        let caps = Capabilities {
            audio: true,
            text: true,
            multi_agent: true,
            ..Default::default()
        };
        assert_eq!(caps.to_string(), "AUDIO TEXT MULTI_AGENT");

        let value = serde_json::to_value(caps).unwrap();
        assert_eq!(value["multiAgent"], true);
        assert_eq!(value["narratedActions"], false);

        let parsed: Capabilities = serde_json::from_str(r#"{"audio":true}"#).unwrap();
        assert!(parsed.audio && !parsed.text);
    }

    #[test]
    fn test_user_request_display() {
        let user = UserRequest {
            name: "Player".into(),
            id: "u1".into(),
            user_settings: UserSettings::default(),
        }
        .with_profile_field("age", "30");
        assert_eq!(user.to_string(), "Player: u1 age: 30");
        assert!(!UserRequest::new("x").id.is_empty());
    }

    #[test]
    fn test_continuation_validity() {
        assert!(!Continuation::default().is_valid());
        assert!(!Continuation::saved_state("").is_valid());

        let continuation = Continuation::saved_state("abcdefgh1234");
        assert!(continuation.is_valid());
        let value = serde_json::to_value(&continuation).unwrap();
        assert_eq!(
            value["continuationType"],
            "CONTINUATION_TYPE_EXTERNALLY_SAVED_STATE"
        );
    }

    #[test]
    fn test_feedback_serialization_skips_ids() {
        let feedback = Feedback::new(false, "i1", "c1", "too long")
            .with_dislikes(vec!["IRRELEVANT".into()]);
        let value = serde_json::to_value(&feedback).unwrap();
        assert_eq!(value["isLike"], false);
        assert_eq!(value["type"][0], "IRRELEVANT");
        assert!(value.get("interactionId").is_none());
        assert!(value.get("name").is_none());
    }
}
