//! HTTP API layer.
//!
//! This module contains thin handlers that delegate to services.
//! It provides the router construction and server startup functionality.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::bootstrap::BootstrappedServices;
use crate::broadcast::BroadcastService;
use crate::context::NetworkContext;
use crate::error::{InteraktivError, InteraktivResult};
use crate::events::Notifier;
use crate::services::PresentationStore;
use crate::state::Config;

pub mod http;
pub mod response;
pub mod sse;

/// Errors that can occur when starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to a TCP port.
    #[error("Failed to bind to port: {0}")]
    Bind(#[from] std::io::Error),
}

/// Orders "update table, then publish its snapshot" per table.
///
/// Without it two concurrent writers could publish their snapshots in the
/// opposite order they were taken, leaving clients on a stale list.
#[derive(Default)]
pub(crate) struct PublishOrder {
    pub(crate) nicknames: Mutex<()>,
    pub(crate) likerts: Mutex<()>,
    pub(crate) answers: Mutex<()>,
}

/// Shared application state for the API layer.
///
/// This is a thin wrapper that holds references to services.
/// All business logic lives in the services themselves.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast service (local announcer or RPC client).
    pub broadcast: Arc<dyn BroadcastService>,
    /// Formats and publishes domain events.
    pub notifier: Notifier,
    /// Nicknames, votes and answers.
    pub store: Arc<PresentationStore>,
    /// Network configuration (port, local IP).
    pub network: NetworkContext,
    /// Application configuration.
    pub config: Arc<RwLock<Config>>,
    /// Ends open event streams on shutdown.
    pub shutdown: CancellationToken,
    /// Whether the HTTP listener is bound.
    listening: Arc<AtomicBool>,
    pub(crate) publish_order: Arc<PublishOrder>,
}

/// Builder for constructing an `AppState`.
#[derive(Default)]
pub struct AppStateBuilder {
    broadcast: Option<Arc<dyn BroadcastService>>,
    store: Option<Arc<PresentationStore>>,
    network: Option<NetworkContext>,
    config: Option<Arc<RwLock<Config>>>,
    shutdown: Option<CancellationToken>,
}

impl AppStateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the broadcast service.
    pub fn broadcast(mut self, broadcast: Arc<dyn BroadcastService>) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    /// Sets the presentation store. Defaults to an empty store.
    pub fn store(mut self, store: Arc<PresentationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the network context.
    pub fn network(mut self, network: NetworkContext) -> Self {
        self.network = Some(network);
        self
    }

    /// Sets the configuration. Defaults to [`Config::default`].
    pub fn config(mut self, config: Arc<RwLock<Config>>) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the shutdown token shared with the rest of the process.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Builds the `AppState`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the broadcast service or network
    /// context is missing.
    pub fn build(self) -> InteraktivResult<AppState> {
        let broadcast = self.broadcast.ok_or_else(|| {
            InteraktivError::Configuration("broadcast service is required".into())
        })?;
        let network = self
            .network
            .ok_or_else(|| InteraktivError::Configuration("network context is required".into()))?;

        Ok(AppState {
            notifier: Notifier::new(Arc::clone(&broadcast)),
            broadcast,
            store: self.store.unwrap_or_default(),
            network,
            config: self.config.unwrap_or_default(),
            shutdown: self.shutdown.unwrap_or_default(),
            listening: Arc::new(AtomicBool::new(false)),
            publish_order: Arc::default(),
        })
    }
}

impl AppState {
    /// Creates a new builder for constructing an `AppState`.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Creates an `AppState` from bootstrapped services.
    pub fn new(services: &BootstrappedServices, config: Arc<RwLock<Config>>) -> Self {
        Self {
            broadcast: Arc::clone(&services.broadcast),
            notifier: services.notifier.clone(),
            store: Arc::clone(&services.store),
            network: services.network.clone(),
            config,
            shutdown: services.cancel_token.clone(),
            listening: Arc::new(AtomicBool::new(false)),
            publish_order: Arc::default(),
        }
    }

    /// Marks the HTTP listener as bound.
    pub fn mark_listening(&self) {
        self.listening.store(true, Ordering::SeqCst);
    }

    /// Returns whether the HTTP listener is bound.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

/// Starts the HTTP server and serves until the state's shutdown token fires.
///
/// A preferred port of 0 lets the OS pick one; the bound port is published
/// through the network context either way.
pub async fn start_server(state: AppState) -> Result<(), ServerError> {
    let preferred_port = state.config.read().preferred_port;
    let addr = SocketAddr::from(([0, 0, 0, 0], preferred_port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let port = listener.local_addr()?.port();

    // Set port and signal waiters
    state.network.set_port(port);
    state.mark_listening();

    log::info!("Server listening on http://0.0.0.0:{}", port);
    log::info!(
        "Audience URL: http://{}:{}",
        state.network.get_local_ip(),
        port
    );

    let shutdown = state.shutdown.clone();
    let app = http::create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await?;

    log::info!("Server on port {} stopped", port);
    Ok(())
}
