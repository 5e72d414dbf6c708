//! Ordered buffer of packets waiting for a live connection, plus a bounded
//! history of packets already sent.

use crate::registry::LiveSessionRegistry;
use chrono::Utc;
use inworld_realtime_types::{Packet, PacketId, Payload, Target};
use std::collections::VecDeque;

/// A packet together with its logical destination.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingPacket {
    pub packet: Packet,
    pub target: Target,
}

impl OutgoingPacket {
    pub fn new(packet: Packet, target: Target) -> Self {
        Self { packet, target }
    }

    /// Stamps send-time fields and resolves the target to wire routing.
    /// Returns the packet back as an error when the target cannot be resolved.
    pub fn finalize(self, registry: &LiveSessionRegistry) -> Result<Packet, Box<OutgoingPacket>> {
        let Some(targets) = registry.resolve(&self.target) else {
            return Err(Box::new(self));
        };
        let OutgoingPacket { mut packet, target } = self;

        packet.timestamp = Utc::now();
        if packet.packet_id.packet_id.is_empty() {
            packet.packet_id.packet_id = PacketId::new().packet_id;
        }
        if let Some(id) = target.conversation_id() {
            packet.packet_id.conversation_id = Some(id.to_string());
        }
        if let Payload::Control(control) = &mut packet.payload {
            if let Some(update) = control.conversation_update.as_mut() {
                update.participants = targets.clone();
            }
        }
        packet.routing.targets = targets;
        Ok(packet)
    }
}

#[derive(Debug)]
pub struct OutgoingQueue {
    pending: VecDeque<OutgoingPacket>,
    sent: VecDeque<Packet>,
    max_sent: usize,
}

impl OutgoingQueue {
    pub fn new(max_sent: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            sent: VecDeque::new(),
            max_sent: max_sent.max(1),
        }
    }

    pub fn enqueue(&mut self, outgoing: OutgoingPacket) {
        self.pending.push_back(outgoing);
    }

    /// Oldest pending packet first.
    pub fn pop_pending(&mut self) -> Option<OutgoingPacket> {
        self.pending.pop_front()
    }

    /// Puts back a packet the transport refused, ahead of everything else.
    pub fn requeue_front(&mut self, outgoing: OutgoingPacket) {
        self.pending.push_front(outgoing);
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Appends to the sent history, evicting the oldest entries beyond the cap.
    pub fn record_sent(&mut self, packet: Packet) {
        self.sent.push_back(packet);
        while self.sent.len() > self.max_sent {
            self.sent.pop_front();
        }
    }

    pub fn sent_len(&self) -> usize {
        self.sent.len()
    }

    /// Drops sent entries of a finished interaction. Returns how many were removed.
    pub fn complete_interaction(&mut self, interaction_id: &str) -> usize {
        if interaction_id.is_empty() {
            return 0;
        }
        let before = self.sent.len();
        self.sent
            .retain(|packet| packet.packet_id.interaction_id != interaction_id);
        before - self.sent.len()
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inworld_realtime_types::{Actor, CharacterData, ControlAction};

    fn registry() -> LiveSessionRegistry {
        let mut registry = LiveSessionRegistry::new();
        registry.register(vec![
            CharacterData {
                agent_id: "a1".into(),
                brain_name: "workspaces/w/characters/one".into(),
                ..Default::default()
            },
            CharacterData {
                agent_id: "a2".into(),
                brain_name: "workspaces/w/characters/two".into(),
                ..Default::default()
            },
        ]);
        registry
    }

    fn text_to(name: &str, body: &str) -> OutgoingPacket {
        OutgoingPacket::new(Packet::text(body), Target::Character(name.into()))
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = OutgoingQueue::new(10);
        for body in ["one", "two", "three"] {
            queue.enqueue(text_to("workspaces/w/characters/one", body));
        }
        let order: Vec<String> = std::iter::from_fn(|| queue.pop_pending())
            .map(|o| o.packet.as_text().unwrap().text.clone())
            .collect();
        assert_eq!(order, vec!["one", "two", "three"]);
        assert!(!queue.has_pending());
    }

    #[test]
    fn test_requeue_front() {
        let mut queue = OutgoingQueue::new(10);
        queue.enqueue(text_to("x", "first"));
        queue.enqueue(text_to("x", "second"));
        let first = queue.pop_pending().unwrap();
        queue.requeue_front(first);
        assert_eq!(queue.pending_len(), 2);
        assert_eq!(queue.pop_pending().unwrap().packet.as_text().unwrap().text, "first");
    }

    #[test]
    fn test_sent_history_is_bounded() {
        let mut queue = OutgoingQueue::new(3);
        for i in 0..5 {
            queue.record_sent(Packet::text(format!("m{}", i)));
            assert!(queue.sent_len() <= 3);
        }
        let kept: Vec<String> = queue
            .sent
            .iter()
            .map(|p| p.as_text().unwrap().text.clone())
            .collect();
        assert_eq!(kept, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn test_complete_interaction_removes_entries() {
        let mut queue = OutgoingQueue::new(10);
        for (i, interaction) in ["i1", "i2", "i1"].iter().enumerate() {
            let mut packet = Packet::text(format!("m{}", i));
            packet.packet_id.interaction_id = interaction.to_string();
            queue.record_sent(packet);
        }
        assert_eq!(queue.complete_interaction("i1"), 2);
        assert_eq!(queue.sent_len(), 1);
        assert_eq!(queue.complete_interaction(""), 0);
    }

    #[test]
    fn test_finalize_resolves_routing() {
        let registry = registry();
        let mut outgoing = text_to("workspaces/w/characters/two", "hi");
        outgoing.packet.packet_id.packet_id.clear();
        let packet = outgoing.finalize(&registry).unwrap();
        assert_eq!(packet.routing.targets, vec![Actor::agent("a2")]);
        assert!(!packet.packet_id.packet_id.is_empty());
        assert!(packet.packet_id.conversation_id.is_none());
    }

    #[test]
    fn test_finalize_conversation_update() {
        let registry = registry();
        let target = Target::Conversation {
            id: "conv-1".into(),
            participants: vec![
                "workspaces/w/characters/one".into(),
                "workspaces/w/characters/two".into(),
            ],
        };
        let packet = OutgoingPacket::new(Packet::conversation_update(), target)
            .finalize(&registry)
            .unwrap();
        assert_eq!(packet.packet_id.conversation_id.as_deref(), Some("conv-1"));
        let control = packet.as_control().unwrap();
        assert_eq!(control.action, ControlAction::ConversationUpdate);
        assert_eq!(
            control.conversation_update.as_ref().unwrap().participants,
            vec![Actor::agent("a1"), Actor::agent("a2")]
        );
    }

    #[test]
    fn test_finalize_unresolved_target() {
        let registry = registry();
        let outgoing = text_to("workspaces/w/characters/ghost", "hello?");
        let rejected = outgoing.clone().finalize(&registry).unwrap_err();
        assert_eq!(*rejected, outgoing);
    }
}
