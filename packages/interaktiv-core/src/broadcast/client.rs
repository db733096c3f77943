//! Broadcast RPC client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};

use super::protocol::{self, read_frame, remote_error, send_frame, ClientFrame, ServerFrame};
use super::registry::{Delivery, ListenerQueue, ListenerReceiver};
use super::{
    BroadcastEndpoint, BroadcastError, BroadcastResult, BroadcastService, ListenerId, Readiness,
    Subscription,
};
use crate::events::Event;
use crate::protocol_constants::{BROADCAST_READY_TIMEOUT_SECS, RPC_CONNECT_RETRY_DELAYS_MS};

type FrameSink = SplitSink<Framed<TcpStream, LinesCodec>, String>;
type FrameStream = SplitStream<Framed<TcpStream, LinesCodec>>;

/// Authenticated RPC connection after a successful handshake.
struct Connection {
    sink: FrameSink,
    frames: FrameStream,
}

impl Connection {
    async fn request(&mut self, frame: ClientFrame) -> BroadcastResult<ServerFrame> {
        send_frame(&mut self.sink, &frame).await?;
        match read_frame(&mut self.frames).await? {
            Some(ServerFrame::Error { code, message }) => Err(remote_error(&code, message)),
            Some(reply) => Ok(reply),
            None => Err(BroadcastError::Unavailable(
                "broadcast service closed the connection".into(),
            )),
        }
    }
}

fn unexpected(reply: ServerFrame) -> BroadcastError {
    BroadcastError::Protocol(format!("unexpected reply: {:?}", reply))
}

/// Broadcast service reached over the loopback RPC endpoint.
///
/// Request/reply operations open a short-lived connection each. A
/// subscription holds its own connection for as long as it lives.
///
/// Each subscription keeps draining its connection into a local mailbox
/// that follows the same capacity policy as the announcer's, so a stalled
/// consumer drops events here instead of buffering without limit.
#[derive(Clone)]
pub struct RemoteBroadcastService {
    endpoint: BroadcastEndpoint,
    readiness: Option<Readiness>,
    ready_timeout: Duration,
    queue_capacity: Option<usize>,
    /// Events dropped for stalled subscribers of this client.
    dropped: Arc<AtomicU64>,
}

impl RemoteBroadcastService {
    /// Creates a client for a broadcaster at `endpoint`.
    ///
    /// Without a readiness signal, connects are retried with backoff to
    /// ride out a broadcaster that is still starting.
    pub fn new(endpoint: BroadcastEndpoint) -> Self {
        Self {
            endpoint,
            readiness: None,
            ready_timeout: Duration::from_secs(BROADCAST_READY_TIMEOUT_SECS),
            queue_capacity: None,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bounds the local mailbox of every subscription (`None` = unbounded).
    /// A full mailbox drops the newest event for that subscription only.
    pub fn with_queue_capacity(mut self, capacity: Option<usize>) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Waits on `readiness` before the first call and connects to the
    /// address it reports.
    pub fn with_readiness(mut self, readiness: Readiness) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Overrides how long to wait for the readiness signal.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &BroadcastEndpoint {
        &self.endpoint
    }

    async fn connect(&self) -> BroadcastResult<Connection> {
        let addr = match &self.readiness {
            Some(readiness) => readiness
                .wait_timeout(self.ready_timeout)
                .await
                .ok_or_else(|| {
                    BroadcastError::Unavailable(format!(
                        "broadcast service not ready after {:?}",
                        self.ready_timeout
                    ))
                })?,
            None => self.endpoint.addr,
        };

        let stream = connect_with_retry(addr).await?;
        let (mut sink, mut frames) = protocol::framed(stream).split();

        send_frame(
            &mut sink,
            &ClientFrame::Hello {
                token: self.endpoint.token.clone(),
            },
        )
        .await?;

        match read_frame(&mut frames).await? {
            Some(ServerFrame::Welcome) => Ok(Connection { sink, frames }),
            Some(ServerFrame::Error { code, message }) => Err(remote_error(&code, message)),
            Some(other) => Err(unexpected(other)),
            None => Err(BroadcastError::Unavailable(
                "connection closed during handshake".into(),
            )),
        }
    }
}

/// Connects with backoff on transient failures (200, 500, 1000, 2000 ms).
async fn connect_with_retry(addr: std::net::SocketAddr) -> BroadcastResult<TcpStream> {
    let mut last_error = None;
    for (attempt, &delay_ms) in std::iter::once(&0)
        .chain(RPC_CONNECT_RETRY_DELAYS_MS.iter())
        .enumerate()
    {
        if attempt > 0 {
            log::info!(
                "[Broadcast] Retrying connect to {} (attempt {}/{}) after {}ms",
                addr,
                attempt + 1,
                RPC_CONNECT_RETRY_DELAYS_MS.len() + 1,
                delay_ms
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                return Ok(stream);
            }
            Err(e) => {
                let err = BroadcastError::from(e);
                log::warn!("[Broadcast] Connect to {} failed: {}", addr, err);
                last_error = Some(err);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| BroadcastError::Unavailable(format!("could not connect to {}", addr))))
}

#[async_trait]
impl BroadcastService for RemoteBroadcastService {
    async fn publish(&self, event: Event) -> BroadcastResult<usize> {
        let mut conn = self.connect().await?;
        match conn.request(ClientFrame::Publish { event }).await? {
            ServerFrame::Published { delivered } => Ok(delivered),
            other => Err(unexpected(other)),
        }
    }

    async fn subscribe(&self) -> BroadcastResult<Subscription> {
        let mut conn = self.connect().await?;
        let id = match conn.request(ClientFrame::Subscribe).await? {
            ServerFrame::Subscribed { id } => id,
            other => return Err(unexpected(other)),
        };

        let (queue, rx) = ListenerQueue::channel(self.queue_capacity);
        let reader = tokio::spawn(forward_events(id, conn, queue, Arc::clone(&self.dropped)));
        log::debug!("[Broadcast] Remote {} subscribed", id);

        Ok(Subscription::remote(id, RemoteListener { rx, reader }))
    }

    async fn unsubscribe(&self, id: ListenerId) -> BroadcastResult<bool> {
        let mut conn = self.connect().await?;
        match conn.request(ClientFrame::Unsubscribe { id }).await? {
            ServerFrame::Unsubscribed { removed } => Ok(removed),
            other => Err(unexpected(other)),
        }
    }

    async fn listener_count(&self) -> BroadcastResult<usize> {
        let mut conn = self.connect().await?;
        match conn.request(ClientFrame::ListenerCount).await? {
            ServerFrame::ListenerCount { count } => Ok(count),
            other => Err(unexpected(other)),
        }
    }

    fn subscriber_drops(&self) -> Option<u64> {
        Some(self.dropped.load(Ordering::Relaxed))
    }
}

/// Pumps `event` frames from a streaming connection into the local mailbox.
///
/// Holding `conn` keeps the remote listener registered; returning drops the
/// connection, which makes the server unsubscribe it.
async fn forward_events(
    id: ListenerId,
    mut conn: Connection,
    queue: ListenerQueue,
    dropped: Arc<AtomicU64>,
) {
    loop {
        match read_frame::<_, ServerFrame>(&mut conn.frames).await {
            Ok(Some(ServerFrame::Event { event })) => match queue.deliver(&event) {
                Delivery::Delivered => {}
                Delivery::Dropped => {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    log::trace!("[Broadcast] {} mailbox full, event dropped", id);
                }
                Delivery::Closed => break,
            },
            Ok(Some(other)) => {
                log::debug!("[Broadcast] {} ignoring {:?}", id, other);
            }
            Ok(None) => {
                log::debug!("[Broadcast] {} stream closed by broadcaster", id);
                break;
            }
            Err(e) => {
                log::debug!("[Broadcast] {} stream failed: {}", id, e);
                break;
            }
        }
    }
}

/// Receiving side of a remote subscription.
pub(crate) struct RemoteListener {
    rx: ListenerReceiver,
    reader: JoinHandle<()>,
}

impl RemoteListener {
    pub(crate) async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Drop for RemoteListener {
    fn drop(&mut self) {
        // Aborting the reader drops the connection, which the server treats
        // as an unsubscribe.
        self.reader.abort();
    }
}
