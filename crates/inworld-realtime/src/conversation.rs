//! Tracks the currently addressed target and whether an audio session is open on it.

use inworld_realtime_types::Target;
use std::collections::HashSet;

/// Outcome of changing the addressed target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetChange {
    /// The new target names nobody; nothing changed.
    Empty,
    /// Same target as before; nothing changed.
    Unchanged,
    /// The target was adopted. `stale` holds the previous target when an audio
    /// session was open on it, so the caller can close it there.
    Switched { stale: Option<Target> },
}

#[derive(Debug, Default, Clone)]
pub struct AudioSessionTracker {
    current: Option<Target>,
    started: bool,
    start_packet_id: Option<String>,
}

impl AudioSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Target> {
        self.current.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_started_for(&self, target: &Target) -> bool {
        self.started && self.current.as_ref().is_some_and(|current| same_target(current, target))
    }

    pub fn update_live_info(&mut self, target: Target) -> TargetChange {
        if target.is_empty() {
            return TargetChange::Empty;
        }
        if self.current.as_ref().is_some_and(|current| same_target(current, &target)) {
            return TargetChange::Unchanged;
        }
        let stale = if self.started {
            self.started = false;
            self.start_packet_id = None;
            self.current.clone()
        } else {
            None
        };
        self.current = Some(target);
        TargetChange::Switched { stale }
    }

    /// Addresses a multi-party conversation.
    pub fn update_multi_targets(
        &mut self,
        conversation_id: impl Into<String>,
        participants: Vec<String>,
    ) -> TargetChange {
        let participants: Vec<String> = participants.into_iter().filter(|p| !p.is_empty()).collect();
        if participants.is_empty() {
            return TargetChange::Empty;
        }
        self.update_live_info(Target::Conversation {
            id: conversation_id.into(),
            participants,
        })
    }

    pub fn start_audio_session(&mut self, packet_id: impl Into<String>) {
        self.started = true;
        self.start_packet_id = Some(packet_id.into());
    }

    /// Closes the audio session. Returns the id of the packet that opened it.
    pub fn stop_audio_session(&mut self) -> Option<String> {
        self.started = false;
        self.start_packet_id.take()
    }

    /// Forgets any open audio session, keeping the addressed target.
    pub fn reset(&mut self) {
        self.started = false;
        self.start_packet_id = None;
    }
}

/// Conversations match on id and participant set; order does not matter.
fn same_target(a: &Target, b: &Target) -> bool {
    match (a, b) {
        (
            Target::Conversation { id: a_id, participants: a_names },
            Target::Conversation { id: b_id, participants: b_names },
        ) => {
            let a_set: HashSet<&String> = a_names.iter().collect();
            let b_set: HashSet<&String> = b_names.iter().collect();
            a_id == b_id && a_set == b_set
        }
        _ => a == b,
    }
}
