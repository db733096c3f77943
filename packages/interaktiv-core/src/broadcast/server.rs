//! Broadcast RPC server.
//!
//! Hosts an [`Announcer`] behind a loopback TCP endpoint so producers and
//! stream handlers in other tasks, runtimes or processes can reach it.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{Sink, Stream, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;

use super::protocol::{
    self, read_frame, send_frame, tokens_match, ClientFrame, ServerFrame, CODE_PROTOCOL,
    CODE_SHUTTING_DOWN, CODE_UNAUTHORIZED,
};
use super::{Announcer, BroadcastError, BroadcastResult, Readiness};

/// Serves the broadcast operations of one announcer over loopback RPC.
///
/// Cheap to clone; clones share the announcer, readiness signal and
/// cancellation token.
#[derive(Clone)]
pub struct BroadcastServer {
    announcer: Arc<Announcer>,
    token: Arc<str>,
    readiness: Readiness,
    cancel: CancellationToken,
}

impl BroadcastServer {
    /// Creates a server for `announcer` that admits clients presenting `token`.
    pub fn new(announcer: Arc<Announcer>, token: impl Into<String>) -> Self {
        Self {
            announcer,
            token: Arc::from(token.into()),
            readiness: Readiness::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the hosted announcer.
    pub fn announcer(&self) -> &Arc<Announcer> {
        &self.announcer
    }

    /// Returns the signal fired once the listener is bound.
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Returns the token that stops the server and severs every stream.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Binds `addr` and serves until cancelled.
    pub async fn serve(&self, addr: SocketAddr) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Serves on an already bound listener until cancelled.
    ///
    /// The readiness signal fires before the first accept.
    pub async fn serve_listener(&self, listener: TcpListener) -> io::Result<()> {
        let local_addr = listener.local_addr()?;
        self.readiness.mark_ready(local_addr);
        log::info!("[Broadcast] RPC endpoint listening on {}", local_addr);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("[Broadcast] Connection from {}", peer);
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            Arc::clone(&self.announcer),
                            Arc::clone(&self.token),
                            self.cancel.child_token(),
                        ));
                    }
                    Err(e) => {
                        log::warn!("[Broadcast] Accept failed: {}", e);
                    }
                },
            }
        }

        log::info!("[Broadcast] RPC endpoint on {} stopped", local_addr);
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    announcer: Arc<Announcer>,
    token: Arc<str>,
    cancel: CancellationToken,
) {
    let (mut sink, mut frames) = protocol::framed(stream).split();

    match serve_connection(&mut sink, &mut frames, &announcer, &token, &cancel).await {
        Ok(()) => log::debug!("[Broadcast] Connection from {} closed", peer),
        Err(BroadcastError::Unauthorized) => {
            log::warn!("[Broadcast] Rejected {}: bad token", peer)
        }
        Err(e) => log::debug!("[Broadcast] Connection from {} ended: {}", peer, e),
    }
}

async fn serve_connection<S, R>(
    sink: &mut S,
    frames: &mut R,
    announcer: &Arc<Announcer>,
    token: &str,
    cancel: &CancellationToken,
) -> BroadcastResult<()>
where
    S: Sink<String, Error = LinesCodecError> + Unpin,
    R: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    let hello = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        frame = read_frame::<_, ClientFrame>(frames) => frame?,
    };

    match hello {
        Some(ClientFrame::Hello { token: presented }) if tokens_match(token, &presented) => {
            send_frame(sink, &ServerFrame::Welcome).await?;
        }
        Some(ClientFrame::Hello { .. }) => {
            send_frame(sink, &ServerFrame::error(CODE_UNAUTHORIZED, "invalid token")).await?;
            return Err(BroadcastError::Unauthorized);
        }
        Some(_) => {
            send_frame(sink, &ServerFrame::error(CODE_PROTOCOL, "expected hello")).await?;
            return Err(BroadcastError::Protocol("request before hello".into()));
        }
        None => return Ok(()),
    }

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                // Best effort; the peer may already be gone.
                let _ = send_frame(sink, &ServerFrame::error(CODE_SHUTTING_DOWN, "server stopping")).await;
                return Ok(());
            }
            frame = read_frame::<_, ClientFrame>(frames) => frame?,
        };

        let Some(frame) = frame else {
            return Ok(());
        };

        let reply = match frame {
            ClientFrame::Publish { event } => ServerFrame::Published {
                delivered: announcer.publish(event).delivered,
            },
            ClientFrame::Unsubscribe { id } => ServerFrame::Unsubscribed {
                removed: announcer.unsubscribe(id),
            },
            ClientFrame::ListenerCount => ServerFrame::ListenerCount {
                count: announcer.listener_count(),
            },
            ClientFrame::Subscribe => return stream_events(sink, frames, announcer, cancel).await,
            ClientFrame::Hello { .. } => ServerFrame::error(CODE_PROTOCOL, "duplicate hello"),
        };
        send_frame(sink, &reply).await?;
    }
}

/// Turns the connection into an event stream for a new listener.
///
/// The listener is dropped, and therefore unsubscribed, when this returns:
/// peer disconnect, write failure, remote unsubscribe or server shutdown.
async fn stream_events<S, R>(
    sink: &mut S,
    frames: &mut R,
    announcer: &Arc<Announcer>,
    cancel: &CancellationToken,
) -> BroadcastResult<()>
where
    S: Sink<String, Error = LinesCodecError> + Unpin,
    R: Stream<Item = Result<String, LinesCodecError>> + Unpin,
{
    let mut listener = announcer.subscribe();
    send_frame(sink, &ServerFrame::Subscribed { id: listener.id() }).await?;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),

            event = listener.recv() => match event {
                Some(event) => send_frame(sink, &ServerFrame::Event { event }).await?,
                None => {
                    log::debug!("[Broadcast] {} unsubscribed remotely", listener.id());
                    return Ok(());
                }
            },

            frame = read_frame::<_, ClientFrame>(frames) => match frame? {
                None => return Ok(()),
                Some(other) => {
                    log::debug!("[Broadcast] Ignoring {:?} on streaming connection", other);
                }
            },
        }
    }
}
