//! Broadcast subsystem.
//!
//! One authoritative [`Announcer`] fans events out to per-listener mailboxes.
//! Producers and stream handlers reach it through the [`BroadcastService`]
//! trait, which has two implementations:
//!
//! - [`LocalBroadcastService`]: the announcer lives in this process.
//! - [`RemoteBroadcastService`]: the announcer is hosted by a
//!   [`BroadcastServer`] behind an authenticated loopback RPC endpoint,
//!   possibly in another OS process.
//!
//! [`BroadcastWorker`] runs a [`BroadcastServer`] on its own runtime thread
//! for deployments that want the broadcaster isolated from request handling.

mod announcer;
mod client;
mod local;
mod protocol;
mod readiness;
mod registry;
mod server;
mod worker;

pub use announcer::{Announcer, AnnouncerStats, Listener, PublishReport};
pub use client::RemoteBroadcastService;
pub use local::LocalBroadcastService;
pub use readiness::Readiness;
pub use registry::ListenerId;
pub use server::BroadcastServer;
pub use worker::BroadcastWorker;

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use thiserror::Error;

use crate::events::Event;
use crate::protocol_constants::DEFAULT_BROADCAST_PORT;

/// Errors surfaced by a [`BroadcastService`].
///
/// Failures of individual listeners never show up here; they are contained
/// by the announcer.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The broadcast service could not be reached.
    #[error("Broadcast service unavailable: {0}")]
    Unavailable(String),

    /// The broadcast service rejected the shared token.
    #[error("Broadcast service rejected the access token")]
    Unauthorized,

    /// The peer sent something that does not follow the RPC protocol.
    #[error("Broadcast protocol error: {0}")]
    Protocol(String),

    /// The payload could not be serialized into an event.
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    /// The broadcast service is stopping.
    #[error("Broadcast service is shutting down")]
    ShuttingDown,
}

impl BroadcastError {
    /// Returns `true` for connectivity failures worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<std::io::Error> for BroadcastError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Convenient Result alias for broadcast operations.
pub type BroadcastResult<T> = Result<T, BroadcastError>;

/// Where the broadcast service is reachable and how to authenticate.
///
/// Fixed at startup and read-only thereafter.
#[derive(Clone, PartialEq, Eq)]
pub struct BroadcastEndpoint {
    /// Loopback address of the RPC listener.
    pub addr: SocketAddr,
    /// Shared secret presented in the handshake.
    pub token: String,
}

impl BroadcastEndpoint {
    /// Creates an endpoint on `127.0.0.1:<port>`.
    pub fn loopback(port: u16, token: impl Into<String>) -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            token: token.into(),
        }
    }
}

impl Default for BroadcastEndpoint {
    fn default() -> Self {
        Self::loopback(DEFAULT_BROADCAST_PORT, generate_token())
    }
}

impl fmt::Debug for BroadcastEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastEndpoint")
            .field("addr", &self.addr)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Generates a random shared token for a broadcaster started by this process.
#[must_use]
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// The four broadcast operations, callable regardless of where the
/// announcer lives.
#[async_trait]
pub trait BroadcastService: Send + Sync {
    /// Fans `event` out to every current subscriber.
    ///
    /// Returns the number of listeners the event was queued for. Success
    /// refers to the publish call only, not to individual deliveries.
    async fn publish(&self, event: Event) -> BroadcastResult<usize>;

    /// Subscribes a new listener. Only later events are delivered.
    async fn subscribe(&self) -> BroadcastResult<Subscription>;

    /// Removes a listener. Idempotent.
    async fn unsubscribe(&self, id: ListenerId) -> BroadcastResult<bool>;

    /// Returns the current number of listeners (diagnostic only).
    async fn listener_count(&self) -> BroadcastResult<usize>;

    /// Returns delivery counters when the announcer is in this process.
    fn stats(&self) -> Option<AnnouncerStats> {
        None
    }

    /// Returns how many events this client dropped for its own stalled
    /// subscribers, when it keeps per-subscription mailboxes of its own.
    fn subscriber_drops(&self) -> Option<u64> {
        None
    }
}

/// A live subscription returned by [`BroadcastService::subscribe`].
///
/// Dropping it unsubscribes, locally or by closing the RPC stream.
pub struct Subscription {
    id: ListenerId,
    source: SubscriptionSource,
}

enum SubscriptionSource {
    Local(Listener),
    Remote(client::RemoteListener),
}

impl Subscription {
    pub(crate) fn local(listener: Listener) -> Self {
        Self {
            id: listener.id(),
            source: SubscriptionSource::Local(listener),
        }
    }

    pub(crate) fn remote(id: ListenerId, listener: client::RemoteListener) -> Self {
        Self {
            id,
            source: SubscriptionSource::Remote(listener),
        }
    }

    /// Returns the listener identity.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` when the subscription has ended: it was unsubscribed,
    /// or the broadcast service went away.
    pub async fn next_event(&mut self) -> Option<Event> {
        match &mut self.source {
            SubscriptionSource::Local(listener) => listener.recv().await,
            SubscriptionSource::Remote(listener) => listener.recv().await,
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            SubscriptionSource::Local(_) => "local",
            SubscriptionSource::Remote(_) => "remote",
        };
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(BroadcastError::Unavailable("refused".into()).is_transient());
        assert!(!BroadcastError::Unauthorized.is_transient());
        assert!(!BroadcastError::Protocol("bad".into()).is_transient());
    }

    #[test]
    fn endpoint_debug_redacts_token() {
        let endpoint = BroadcastEndpoint::loopback(2437, "secret");
        let debug = format!("{:?}", endpoint);
        assert!(debug.contains("127.0.0.1:2437"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn generated_tokens_differ() {
        assert_ne!(generate_token(), generate_token());
    }
}
