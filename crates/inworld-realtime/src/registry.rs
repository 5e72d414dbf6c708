//! Characters bound to the current session, keyed by their stable full name.

use inworld_realtime_types::{Actor, CharacterData, Target};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone)]
pub struct LiveSessionRegistry {
    characters: HashMap<String, CharacterData>,
}

impl LiveSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the registry with the agents of a freshly loaded scene.
    /// Agents missing either id are skipped.
    pub fn register(&mut self, agents: Vec<CharacterData>) {
        self.characters.clear();
        for agent in agents {
            if agent.agent_id.is_empty() || agent.brain_name.is_empty() {
                warn!(?agent, "Skipping agent without ids");
                continue;
            }
            debug!(character = %agent, "Registered live session");
            self.characters.insert(agent.brain_name.clone(), agent);
        }
    }

    pub fn get(&self, full_name: &str) -> Option<&CharacterData> {
        self.characters.get(full_name)
    }

    /// Live agent id of a character, if it is loaded in the current session.
    pub fn agent_id(&self, full_name: &str) -> Option<&str> {
        self.characters
            .get(full_name)
            .map(|c| c.agent_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Reverse lookup used to attribute inbound packets.
    pub fn by_agent_id(&self, agent_id: &str) -> Option<&CharacterData> {
        if agent_id.is_empty() {
            return None;
        }
        self.characters.values().find(|c| c.agent_id == agent_id)
    }

    /// Forgets agent ids but keeps character metadata.
    pub fn unload_scene(&mut self) {
        for character in self.characters.values_mut() {
            character.agent_id.clear();
        }
    }

    /// True when at least one character has a live agent id.
    pub fn is_live(&self) -> bool {
        self.characters.values().any(|c| !c.agent_id.is_empty())
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn snapshot(&self) -> Vec<CharacterData> {
        let mut characters: Vec<CharacterData> = self.characters.values().cloned().collect();
        characters.sort_by(|a, b| a.brain_name.cmp(&b.brain_name));
        characters
    }

    /// Turns a logical target into wire targets. `None` when any named
    /// character has no live agent id, or the target names nobody.
    pub fn resolve(&self, target: &Target) -> Option<Vec<Actor>> {
        if target.is_empty() {
            return None;
        }
        match target {
            Target::World => Some(vec![Actor::world()]),
            Target::Agent(id) => Some(vec![Actor::agent(id.clone())]),
            _ => target
                .full_names()
                .into_iter()
                .filter(|name| !name.is_empty())
                .map(|name| self.agent_id(name).map(Actor::agent))
                .collect(),
        }
    }
}
