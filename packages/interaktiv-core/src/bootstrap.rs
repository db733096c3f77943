//! Application bootstrap and dependency wiring.
//!
//! This module is the composition root: the broadcast service matching the
//! configured [`BroadcastMode`] is chosen here, and everything that publishes
//! or subscribes receives it as `Arc<dyn BroadcastService>`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{
    generate_token, BroadcastEndpoint, BroadcastService, BroadcastWorker, LocalBroadcastService,
    RemoteBroadcastService,
};
use crate::context::{LocalIpDetector, NetworkContext};
use crate::error::{InteraktivError, InteraktivResult};
use crate::events::Notifier;
use crate::protocol_constants::BROADCAST_READY_TIMEOUT_SECS;
use crate::services::PresentationStore;
use crate::state::{BroadcastMode, Config};

/// Container for all bootstrapped services.
///
/// Consumed by [`AppState::new`](crate::AppState::new) to build the HTTP
/// layer's state.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Broadcast service for the configured mode.
    pub broadcast: Arc<dyn BroadcastService>,
    /// Formats domain events and publishes them.
    pub notifier: Notifier,
    /// Nicknames, votes and answers.
    pub store: Arc<PresentationStore>,
    /// Network configuration (port, local IP).
    pub network: NetworkContext,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// In-process broadcaster thread (worker mode only).
    worker: Option<Arc<Mutex<BroadcastWorker>>>,
}

impl BootstrappedServices {
    /// Initiates graceful shutdown of all services.
    ///
    /// Open event streams end, and in worker mode the broadcaster thread is
    /// stopped and joined.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();

        if let Some(worker) = &self.worker {
            let worker = Arc::clone(worker);
            // Joining the worker thread blocks
            if let Err(e) = tokio::task::spawn_blocking(move || worker.lock().shutdown()).await {
                log::error!("[Bootstrap] Broadcast worker shutdown failed: {}", e);
            }
        }

        log::info!("[Bootstrap] Shutdown complete");
    }

    /// Returns whether the broadcaster runs on a dedicated worker thread.
    pub fn has_worker(&self) -> bool {
        self.worker.is_some()
    }
}

/// Bootstraps all services, auto-detecting the LAN address.
///
/// Falls back to the loopback address when no interface can be detected,
/// so the server still starts on isolated machines.
///
/// # Errors
///
/// See [`bootstrap_services_with_network`].
pub async fn bootstrap_services(config: &Config) -> InteraktivResult<BootstrappedServices> {
    let network = match NetworkContext::auto_detect(config.preferred_port, LocalIpDetector::arc()) {
        Ok(network) => network,
        Err(e) => {
            log::warn!(
                "[Bootstrap] Local IP detection failed ({}), advertising loopback",
                e
            );
            NetworkContext::explicit(config.preferred_port, Ipv4Addr::LOCALHOST.into())
        }
    };
    bootstrap_services_with_network(config, network).await
}

/// Bootstraps all services with a pre-built network context.
///
/// Wiring order:
///
/// 1. Validate configuration
/// 2. Broadcast service for the configured mode (may start the worker thread)
/// 3. Notifier and presentation store
///
/// # Errors
///
/// Returns a configuration error if the configuration is invalid, or an
/// internal error if the broadcast worker fails to start.
pub async fn bootstrap_services_with_network(
    config: &Config,
    network: NetworkContext,
) -> InteraktivResult<BootstrappedServices> {
    config.validate().map_err(InteraktivError::Configuration)?;

    let mut worker = None;
    let broadcast: Arc<dyn BroadcastService> = match config.broadcast.mode {
        BroadcastMode::Local => {
            log::info!("[Bootstrap] Broadcast mode: local");
            Arc::new(LocalBroadcastService::with_queue_capacity(
                config.broadcast.queue_capacity,
            ))
        }
        BroadcastMode::Worker => {
            let token = config
                .broadcast
                .token
                .clone()
                .unwrap_or_else(generate_token);
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.broadcast.port));
            let started = BroadcastWorker::start(addr, token, config.broadcast.queue_capacity)
                .await
                .map_err(|e| {
                    InteraktivError::Internal(format!("Failed to start broadcast worker: {}", e))
                })?;

            log::info!(
                "[Bootstrap] Broadcast mode: worker ({})",
                started.endpoint().addr
            );
            let client = RemoteBroadcastService::new(started.endpoint().clone())
                .with_readiness(started.readiness())
                .with_queue_capacity(config.broadcast.queue_capacity);
            worker = Some(Arc::new(Mutex::new(started)));
            Arc::new(client)
        }
        BroadcastMode::External => {
            let token = config.broadcast.token.clone().unwrap_or_default();
            let endpoint = BroadcastEndpoint::loopback(config.broadcast.port, token);
            log::info!("[Bootstrap] Broadcast mode: external ({})", endpoint.addr);
            Arc::new(
                RemoteBroadcastService::new(endpoint)
                    .with_ready_timeout(Duration::from_secs(BROADCAST_READY_TIMEOUT_SECS))
                    .with_queue_capacity(config.broadcast.queue_capacity),
            )
        }
    };

    Ok(BootstrappedServices {
        notifier: Notifier::new(Arc::clone(&broadcast)),
        broadcast,
        store: Arc::new(PresentationStore::new()),
        network,
        cancel_token: CancellationToken::new(),
        worker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::state::BroadcastConfig;
    use serde_json::json;

    fn config(mode: BroadcastMode) -> Config {
        Config {
            broadcast: BroadcastConfig {
                mode,
                port: 0,
                ..BroadcastConfig::default()
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn local_mode_delivers_in_process() {
        let services = bootstrap_services_with_network(
            &config(BroadcastMode::Local),
            NetworkContext::for_test(),
        )
        .await
        .unwrap();
        assert!(!services.has_worker());
        assert!(services.broadcast.stats().is_some());

        let mut sub = services.broadcast.subscribe().await.unwrap();
        services.notifier.ping().await.unwrap();
        let event = sub.next_event().await.unwrap();
        assert_eq!(event.name(), Some("PING"));
    }

    #[tokio::test]
    async fn worker_mode_round_trips_over_rpc() {
        let services = bootstrap_services_with_network(
            &config(BroadcastMode::Worker),
            NetworkContext::for_test(),
        )
        .await
        .unwrap();
        assert!(services.has_worker());

        let mut sub = services.broadcast.subscribe().await.unwrap();
        let delivered = services
            .broadcast
            .publish(Event::named("NICKNAME", json!({"nicknames": ["Hund"]})))
            .await
            .unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(
            sub.next_event().await.unwrap().payload(),
            &json!({"nicknames": ["Hund"]})
        );

        drop(sub);
        services.shutdown().await;
        assert!(services.cancel_token.is_cancelled());
    }

    #[tokio::test]
    async fn external_mode_requires_token() {
        let mut cfg = config(BroadcastMode::External);
        cfg.broadcast.port = 2437;
        let err = bootstrap_services_with_network(&cfg, NetworkContext::for_test())
            .await
            .err()
            .unwrap();
        assert_eq!(err.code(), "configuration_error");
    }

    #[tokio::test]
    async fn external_mode_builds_remote_client() {
        let mut cfg = config(BroadcastMode::External);
        cfg.broadcast.port = 2437;
        cfg.broadcast.token = Some("secret".into());
        let services = bootstrap_services_with_network(&cfg, NetworkContext::for_test())
            .await
            .unwrap();
        assert!(!services.has_worker());
        // Remote services keep delivery counters in the broadcaster process.
        assert!(services.broadcast.stats().is_none());
    }
}
