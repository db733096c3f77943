//! Broadcaster on a dedicated runtime thread.
//!
//! The worker owns its own Tokio runtime so the announcer keeps serving even
//! when the HTTP runtime is saturated. The HTTP side talks to it through
//! [`RemoteBroadcastService`](super::RemoteBroadcastService), exactly as it
//! would talk to a broadcaster in another process.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::net::TcpListener;
use tokio::runtime::Builder;
use tokio::sync::oneshot;

use super::{Announcer, BroadcastEndpoint, BroadcastServer, Readiness};

/// Worker threads for the broadcaster runtime.
///
/// Fan-out never blocks, so one thread handles the RPC load comfortably.
const BROADCAST_WORKER_THREADS: usize = 1;

/// A running broadcaster hosted on its own thread and runtime.
pub struct BroadcastWorker {
    server: BroadcastServer,
    endpoint: BroadcastEndpoint,
    /// Thread join handle for cleanup (None after shutdown).
    thread: Option<JoinHandle<()>>,
}

impl BroadcastWorker {
    /// Starts the broadcaster and returns once its listener is bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread or runtime cannot be created, or if
    /// `addr` cannot be bound.
    pub async fn start(
        addr: SocketAddr,
        token: impl Into<String>,
        queue_capacity: Option<usize>,
    ) -> io::Result<Self> {
        let token = token.into();
        let announcer = Arc::new(Announcer::with_queue_capacity(queue_capacity));
        let server = BroadcastServer::new(announcer, token.clone());
        let task_server = server.clone();
        let (tx, rx) = oneshot::channel::<io::Result<SocketAddr>>();

        let thread = thread::Builder::new()
            .name("broadcast-worker".into())
            .spawn(move || {
                let runtime = match Builder::new_multi_thread()
                    .worker_threads(BROADCAST_WORKER_THREADS)
                    .thread_name("broadcast-rpc")
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                };

                runtime.block_on(async move {
                    let listener = match TcpListener::bind(addr).await {
                        Ok(listener) => listener,
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            return;
                        }
                    };
                    match listener.local_addr() {
                        Ok(bound) => {
                            let _ = tx.send(Ok(bound));
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            return;
                        }
                    }

                    if let Err(e) = task_server.serve_listener(listener).await {
                        log::error!("[Broadcast] Worker stopped with error: {}", e);
                    }
                });

                // Runtime drops here, severing any remaining streams
            })?;

        let bound = rx
            .await
            .map_err(|_| io::Error::other("broadcast worker exited during startup"))??;

        log::info!(
            "[Broadcast] Worker started on {} ({} runtime thread)",
            bound,
            BROADCAST_WORKER_THREADS
        );

        Ok(Self {
            server,
            endpoint: BroadcastEndpoint { addr: bound, token },
            thread: Some(thread),
        })
    }

    /// Returns the bound endpoint, including the shared token.
    pub fn endpoint(&self) -> &BroadcastEndpoint {
        &self.endpoint
    }

    /// Returns the readiness signal of the hosted server.
    pub fn readiness(&self) -> Readiness {
        self.server.readiness()
    }

    /// Returns the hosted announcer.
    pub fn announcer(&self) -> &Arc<Announcer> {
        self.server.announcer()
    }

    /// Stops the broadcaster and waits for its thread to exit.
    pub fn shutdown(&mut self) {
        self.server.cancel_token().cancel();

        if let Some(thread) = self.thread.take() {
            if let Err(e) = thread.join() {
                log::error!("[Broadcast] Worker thread panicked: {:?}", e);
            } else {
                log::info!("[Broadcast] Worker shutdown complete");
            }
        }
    }
}

impl Drop for BroadcastWorker {
    /// Stops the broadcaster without joining its thread, so dropping a worker
    /// from async code never blocks a runtime thread. Call
    /// [`shutdown`](Self::shutdown) to wait for the thread to exit.
    fn drop(&mut self) {
        if self.thread.take().is_some() {
            log::warn!("[Broadcast] Worker dropped without shutdown, detaching its thread");
            self.server.cancel_token().cancel();
        }
    }
}
