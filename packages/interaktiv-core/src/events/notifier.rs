//! Producer-facing notification helper.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::Event;
use crate::broadcast::{BroadcastError, BroadcastResult, BroadcastService};
use crate::protocol_constants::{ANSWER_EVENT_PREFIX, NICKNAME_EVENT, PING_EVENT, PING_PAYLOAD};

/// Formats domain events and publishes them through the broadcast service.
///
/// Stateless and cheap to clone. Never retries: a failed publish is returned
/// to the caller, which decides how to answer its own request.
#[derive(Clone)]
pub struct Notifier {
    broadcast: Arc<dyn BroadcastService>,
}

impl Notifier {
    pub fn new(broadcast: Arc<dyn BroadcastService>) -> Self {
        Self { broadcast }
    }

    /// Publishes `payload` as event `event_name` to every current subscriber.
    ///
    /// Returns the number of listeners the event was queued for.
    pub async fn notify(&self, event_name: &str, payload: impl Serialize) -> BroadcastResult<usize> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| BroadcastError::InvalidPayload(e.to_string()))?;
        let delivered = self
            .broadcast
            .publish(Event::named(event_name, payload))
            .await?;
        log::debug!("[Notifier] {} -> {} listener(s)", event_name, delivered);
        Ok(delivered)
    }

    /// Announces the full nickname list, in registration order.
    pub async fn nicknames(&self, nicknames: &[String]) -> BroadcastResult<usize> {
        self.notify(NICKNAME_EVENT, json!({ "nicknames": nicknames }))
            .await
    }

    /// Announces the current agreement percentage of a Likert scale.
    pub async fn likert(&self, scale: &str, percentage: u32) -> BroadcastResult<usize> {
        self.notify(
            &answer_event(scale),
            json!({ "percentage": percentage }),
        )
        .await
    }

    /// Announces every answer given so far to question `qid`.
    pub async fn answers(&self, qid: &str, answers: &[String]) -> BroadcastResult<usize> {
        self.notify(
            &answer_event(qid),
            json!({ "qid": qid, "answers": answers }),
        )
        .await
    }

    /// Sends the diagnostic ping.
    pub async fn ping(&self) -> BroadcastResult<usize> {
        self.notify(PING_EVENT, PING_PAYLOAD).await
    }
}

fn answer_event(id: &str) -> String {
    format!("{}{}", ANSWER_EVENT_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::LocalBroadcastService;

    fn setup() -> (Notifier, Arc<LocalBroadcastService>) {
        let service = Arc::new(LocalBroadcastService::default());
        (Notifier::new(service.clone()), service)
    }

    #[tokio::test]
    async fn nicknames_event_shape() {
        let (notifier, service) = setup();
        let mut sub = service.subscribe().await.unwrap();

        let delivered = notifier
            .nicknames(&["Hund".to_string(), "Katze".to_string()])
            .await
            .unwrap();
        assert_eq!(delivered, 1);

        let event = sub.next_event().await.unwrap();
        assert_eq!(event.name(), Some("NICKNAME"));
        assert_eq!(event.payload(), &json!({"nicknames": ["Hund", "Katze"]}));
    }

    #[tokio::test]
    async fn likert_and_answer_events_are_prefixed() {
        let (notifier, service) = setup();
        let mut sub = service.subscribe().await.unwrap();

        notifier.likert("q1", 62).await.unwrap();
        notifier
            .answers("q2", &["yes".to_string()])
            .await
            .unwrap();

        let likert = sub.next_event().await.unwrap();
        assert_eq!(likert.name(), Some("A-q1"));
        assert_eq!(likert.payload(), &json!({"percentage": 62}));

        let answers = sub.next_event().await.unwrap();
        assert_eq!(answers.name(), Some("A-q2"));
        assert_eq!(answers.payload(), &json!({"qid": "q2", "answers": ["yes"]}));
    }

    #[tokio::test]
    async fn ping_without_listeners_succeeds() {
        let (notifier, _service) = setup();
        assert_eq!(notifier.ping().await.unwrap(), 0);
    }
}
