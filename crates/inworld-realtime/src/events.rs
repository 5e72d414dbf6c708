//! Observer hooks the client publishes to.
//!
//! Each hook is an ordered list of callbacks. Callbacks run on the client task,
//! in registration order, and must not block.

use crate::client::ConnectionStatus;
use inworld_realtime_types::{CharacterData, InworldError, Packet};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle returned by [`Observers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Observers<T> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Observers<T> {
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Removes a callback. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, value: &T) {
        // Snapshot so a callback may (un)subscribe without deadlocking.
        let callbacks: Vec<Callback<T>> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }
}

/// A forwarded inbound packet, with the character that sent it when known.
#[derive(Debug, Clone)]
pub struct ReceivedPacket {
    pub packet: Packet,
    pub source: Option<CharacterData>,
}

/// All hooks exposed by a client, shared between the client task and its handles.
#[derive(Default)]
pub struct ClientEvents {
    pub packet_sent: Observers<Packet>,
    pub packet_received: Observers<ReceivedPacket>,
    pub global_packet_received: Observers<ReceivedPacket>,
    pub status_changed: Observers<ConnectionStatus>,
    pub error_received: Observers<InworldError>,
}
