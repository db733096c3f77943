//! In-process broadcast service.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    Announcer, AnnouncerStats, BroadcastResult, BroadcastService, ListenerId, Subscription,
};
use crate::events::Event;

/// Broadcast service backed by an announcer in this process.
///
/// Every operation is a short critical section on the announcer lock, so
/// this is safe to share across all request handlers.
#[derive(Clone)]
pub struct LocalBroadcastService {
    announcer: Arc<Announcer>,
}

impl LocalBroadcastService {
    /// Wraps an existing announcer.
    pub fn new(announcer: Arc<Announcer>) -> Self {
        Self { announcer }
    }

    /// Creates a service with a fresh announcer.
    pub fn with_queue_capacity(capacity: Option<usize>) -> Self {
        Self::new(Arc::new(Announcer::with_queue_capacity(capacity)))
    }

    /// Returns the underlying announcer.
    pub fn announcer(&self) -> &Arc<Announcer> {
        &self.announcer
    }
}

impl Default for LocalBroadcastService {
    fn default() -> Self {
        Self::with_queue_capacity(None)
    }
}

#[async_trait]
impl BroadcastService for LocalBroadcastService {
    async fn publish(&self, event: Event) -> BroadcastResult<usize> {
        Ok(self.announcer.publish(event).delivered)
    }

    async fn subscribe(&self) -> BroadcastResult<Subscription> {
        Ok(Subscription::local(self.announcer.subscribe()))
    }

    async fn unsubscribe(&self, id: ListenerId) -> BroadcastResult<bool> {
        Ok(self.announcer.unsubscribe(id))
    }

    async fn listener_count(&self) -> BroadcastResult<usize> {
        Ok(self.announcer.listener_count())
    }

    fn stats(&self) -> Option<AnnouncerStats> {
        Some(self.announcer.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn nickname_then_ping_scenario() {
        let service = LocalBroadcastService::default();

        let mut a = service.subscribe().await.unwrap();
        let nickname = Event::named("NICKNAME", json!({"nicknames": ["Hund"]}));
        service.publish(nickname.clone()).await.unwrap();
        assert_eq!(a.next_event().await, Some(nickname));

        let mut b = service.subscribe().await.unwrap();
        let ping = Event::named("PING", json!("Pinged"));
        assert_eq!(service.publish(ping.clone()).await.unwrap(), 2);

        assert_eq!(a.next_event().await, Some(ping.clone()));
        assert_eq!(b.next_event().await, Some(ping));
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let service = LocalBroadcastService::default();
        let subscription = service.subscribe().await.unwrap();
        assert_eq!(service.listener_count().await.unwrap(), 1);

        drop(subscription);
        assert_eq!(service.listener_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_twice_is_not_an_error() {
        let service = LocalBroadcastService::default();
        let subscription = service.subscribe().await.unwrap();

        assert!(service.unsubscribe(subscription.id()).await.unwrap());
        assert!(!service.unsubscribe(subscription.id()).await.unwrap());
    }

    #[tokio::test]
    async fn exposes_announcer_stats() {
        let service = LocalBroadcastService::default();
        let _subscription = service.subscribe().await.unwrap();
        service.publish(Event::unnamed(json!(1))).await.unwrap();

        let stats = service.stats().unwrap();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.delivered, 1);
    }
}
