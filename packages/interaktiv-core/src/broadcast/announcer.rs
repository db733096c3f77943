//! The announcer: subscriber registry plus fan-out.
//!
//! `publish`, `subscribe` and `unsubscribe` serialize on one lock. The lock is
//! held only while enqueueing into each mailbox, which never waits on the
//! consumer, so a stalled listener cannot hold up producers or other
//! listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::registry::{ListenerId, ListenerQueue, ListenerReceiver, ListenerRegistry};
use crate::events::Event;

/// Result of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReport {
    /// Listeners that got the event queued.
    pub delivered: usize,
    /// Listeners whose bounded mailbox was full (event dropped for them only).
    pub dropped: usize,
    /// Listeners found gone and removed during this publish.
    pub pruned: usize,
}

/// Cumulative delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncerStats {
    pub listeners: usize,
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub pruned: u64,
}

#[derive(Default)]
struct Counters {
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    pruned: AtomicU64,
}

/// Owns the listener registry and fans events out to it.
///
/// A single instance lives for the life of the serving (or broadcaster)
/// process. Share it behind an `Arc`; [`Announcer::subscribe`] needs one so
/// listeners can deregister themselves on drop.
pub struct Announcer {
    registry: Mutex<ListenerRegistry>,
    next_id: AtomicU64,
    /// Mailbox capacity for new listeners (`None` = unbounded).
    queue_capacity: Option<usize>,
    counters: Counters,
}

impl Announcer {
    /// Creates an announcer with unbounded listener mailboxes.
    pub fn new() -> Self {
        Self::with_queue_capacity(None)
    }

    /// Creates an announcer whose listener mailboxes hold at most `capacity`
    /// events (`None` for unbounded).
    pub fn with_queue_capacity(capacity: Option<usize>) -> Self {
        Self {
            registry: Mutex::new(ListenerRegistry::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: capacity,
            counters: Counters::default(),
        }
    }

    /// Registers a new listener.
    ///
    /// Only events published after this call are visible on the returned
    /// listener. Dropping the listener deregisters it.
    pub fn subscribe(self: &Arc<Self>) -> Listener {
        let id = ListenerId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (queue, receiver) = ListenerQueue::channel(self.queue_capacity);

        let total = {
            let mut registry = self.registry.lock();
            registry.insert(id, queue);
            registry.len()
        };
        log::debug!("[Announcer] {} subscribed (total: {})", id, total);

        Listener {
            id,
            receiver,
            announcer: Arc::clone(self),
        }
    }

    /// Enqueues `event` for every registered listener.
    ///
    /// Never fails: full mailboxes drop the event for that listener, and
    /// listeners that are gone are pruned.
    pub fn publish(&self, event: Event) -> PublishReport {
        let fan_out = self.registry.lock().fan_out(&event);

        self.counters.published.fetch_add(1, Ordering::Relaxed);
        self.counters
            .delivered
            .fetch_add(fan_out.delivered as u64, Ordering::Relaxed);
        self.counters
            .dropped
            .fetch_add(fan_out.dropped as u64, Ordering::Relaxed);
        self.counters
            .pruned
            .fetch_add(fan_out.pruned as u64, Ordering::Relaxed);

        if fan_out.dropped > 0 {
            log::warn!(
                "[Announcer] {:?} dropped for {} listener(s) with full mailboxes",
                event.name(),
                fan_out.dropped
            );
        }
        if fan_out.pruned > 0 {
            log::debug!("[Announcer] Pruned {} stale listener(s)", fan_out.pruned);
        }
        log::trace!(
            "[Announcer] {:?} delivered to {} listener(s)",
            event.name(),
            fan_out.delivered
        );

        PublishReport {
            delivered: fan_out.delivered,
            dropped: fan_out.dropped,
            pruned: fan_out.pruned,
        }
    }

    /// Removes a listener. Idempotent; returns `true` only if it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let (removed, remaining) = {
            let mut registry = self.registry.lock();
            let removed = registry.remove(id);
            (removed, registry.len())
        };
        if removed {
            log::debug!(
                "[Announcer] {} unsubscribed (remaining: {})",
                id,
                remaining
            );
        }
        removed
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns a snapshot of the delivery counters.
    #[must_use]
    pub fn stats(&self) -> AnnouncerStats {
        AnnouncerStats {
            listeners: self.listener_count(),
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            pruned: self.counters.pruned.load(Ordering::Relaxed),
        }
    }
}

impl Default for Announcer {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscribed listener: identity plus the receiving end of its mailbox.
///
/// Owned by whoever subscribed. Deregisters itself from the announcer when
/// dropped, so a connection that goes away always cleans up.
pub struct Listener {
    id: ListenerId,
    receiver: ListenerReceiver,
    announcer: Arc<Announcer>,
}

impl Listener {
    /// Returns the listener identity.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` after the listener was unsubscribed and its mailbox
    /// has been drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Takes the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.announcer.unsubscribe(self.id);
    }
}
