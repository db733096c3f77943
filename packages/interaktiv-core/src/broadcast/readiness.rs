//! Startup handshake between the broadcast server and in-process clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// One-shot "accepting connections" signal carrying the bound address.
///
/// The server marks it only after its listener is bound, so a client that
/// waits on it first can never hit a connection-refused race.
#[derive(Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<Option<SocketAddr>>>,
}

impl Readiness {
    /// Creates an unset signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Marks the service ready at `addr` and wakes every waiter.
    pub fn mark_ready(&self, addr: SocketAddr) {
        self.tx.send_replace(Some(addr));
    }

    /// Returns the bound address if the service is ready.
    #[must_use]
    pub fn address(&self) -> Option<SocketAddr> {
        *self.tx.borrow()
    }

    /// Returns whether the ready signal has fired.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.address().is_some()
    }

    /// Waits until the service is ready and returns its address.
    pub async fn wait(&self) -> Option<SocketAddr> {
        let mut rx = self.tx.subscribe();
        let ready = rx.wait_for(Option::is_some).await.ok()?;
        *ready
    }

    /// Like [`Readiness::wait`], giving up after `timeout`.
    pub async fn wait_timeout(&self, timeout: Duration) -> Option<SocketAddr> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .ok()
            .flatten()
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}
