//! Listener registry and per-listener mailboxes.
//!
//! Every subscribed connection owns one mailbox. The registry keeps only the
//! sending half, so it can enqueue into a mailbox but never keeps a listener
//! alive: once the receiving half is dropped, the next fan-out sees the queue
//! closed and prunes the entry.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::events::Event;

/// Process-unique identity of a subscribed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Outcome of enqueueing one event into one mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// The event was queued.
    Delivered,
    /// The mailbox is full; the event was dropped for this listener only.
    Dropped,
    /// The listener is gone.
    Closed,
}

/// Sending half of a listener mailbox.
///
/// Unbounded mailboxes never drop. Bounded mailboxes apply a drop-newest
/// policy: when full, the event being published is discarded for that
/// listener and everything already queued is kept.
pub(crate) enum ListenerQueue {
    Unbounded(mpsc::UnboundedSender<Event>),
    Bounded(mpsc::Sender<Event>),
}

impl ListenerQueue {
    /// Creates a mailbox. `None` means unbounded; a zero capacity is raised to 1.
    pub(crate) fn channel(capacity: Option<usize>) -> (Self, ListenerReceiver) {
        match capacity {
            None => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Self::Unbounded(tx), ListenerReceiver::Unbounded(rx))
            }
            Some(capacity) => {
                let (tx, rx) = mpsc::channel(capacity.max(1));
                (Self::Bounded(tx), ListenerReceiver::Bounded(rx))
            }
        }
    }

    /// Enqueues without waiting. Never blocks on the consumer.
    pub(crate) fn deliver(&self, event: &Event) -> Delivery {
        match self {
            Self::Unbounded(tx) => match tx.send(event.clone()) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
            Self::Bounded(tx) => match tx.try_send(event.clone()) {
                Ok(()) => Delivery::Delivered,
                Err(TrySendError::Full(_)) => Delivery::Dropped,
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            },
        }
    }
}

/// Receiving half of a listener mailbox, owned by the stream that subscribed.
#[derive(Debug)]
pub enum ListenerReceiver {
    Unbounded(mpsc::UnboundedReceiver<Event>),
    Bounded(mpsc::Receiver<Event>),
}

impl ListenerReceiver {
    /// Waits for the next event. Returns `None` once the listener has been
    /// removed from the registry and the mailbox is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        match self {
            Self::Unbounded(rx) => rx.recv().await,
            Self::Bounded(rx) => rx.recv().await,
        }
    }

    /// Takes the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        match self {
            Self::Unbounded(rx) => rx.try_recv().ok(),
            Self::Bounded(rx) => rx.try_recv().ok(),
        }
    }
}

/// Counts from a single fan-out pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
    pub pruned: usize,
}

/// Mapping from listener identity to mailbox.
///
/// Not synchronized on its own; the announcer guards it with a single lock.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: HashMap<ListenerId, ListenerQueue>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, id: ListenerId, queue: ListenerQueue) {
        self.listeners.insert(id, queue);
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Enqueues `event` into every mailbox, pruning listeners that are gone.
    pub(crate) fn fan_out(&mut self, event: &Event) -> FanOut {
        let mut report = FanOut::default();
        self.listeners.retain(|_, queue| match queue.deliver(event) {
            Delivery::Delivered => {
                report.delivered += 1;
                true
            }
            Delivery::Dropped => {
                report.dropped += 1;
                true
            }
            Delivery::Closed => {
                report.pruned += 1;
                false
            }
        });
        report
    }
}
