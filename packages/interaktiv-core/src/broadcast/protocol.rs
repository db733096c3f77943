//! Wire protocol of the broadcast RPC endpoint.
//!
//! Newline-delimited JSON over a loopback TCP connection. Every frame is an
//! object tagged by `type`. The first client frame must be `hello`; after a
//! `subscribe` the connection carries only `event` frames from the server.

use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use super::{BroadcastError, BroadcastResult, ListenerId};
use crate::events::Event;
use crate::protocol_constants::MAX_RPC_FRAME_LEN;

/// Error code sent when the hello token does not match.
pub(crate) const CODE_UNAUTHORIZED: &str = "unauthorized";
/// Error code sent for malformed or out-of-order frames.
pub(crate) const CODE_PROTOCOL: &str = "protocol";
/// Error code sent when the server is stopping.
pub(crate) const CODE_SHUTTING_DOWN: &str = "shutting_down";

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum ClientFrame {
    Hello { token: String },
    Publish { event: Event },
    Subscribe,
    Unsubscribe { id: ListenerId },
    ListenerCount,
}

/// Frames sent by the broadcast server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub(crate) enum ServerFrame {
    Welcome,
    Published { delivered: usize },
    Subscribed { id: ListenerId },
    Event { event: Event },
    Unsubscribed { removed: bool },
    ListenerCount { count: usize },
    Error { code: String, message: String },
}

impl ServerFrame {
    pub(crate) fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Maps an `error` frame received by a client onto a [`BroadcastError`].
pub(crate) fn remote_error(code: &str, message: String) -> BroadcastError {
    match code {
        CODE_UNAUTHORIZED => BroadcastError::Unauthorized,
        CODE_SHUTTING_DOWN => BroadcastError::ShuttingDown,
        _ => BroadcastError::Protocol(message),
    }
}

impl From<LinesCodecError> for BroadcastError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::Io(e) => Self::Unavailable(e.to_string()),
            LinesCodecError::MaxLineLengthExceeded => {
                Self::Protocol(format!("frame exceeds {} bytes", MAX_RPC_FRAME_LEN))
            }
        }
    }
}

/// Wraps a connection in the line codec used by both sides.
pub(crate) fn framed<T>(io: T) -> Framed<T, LinesCodec>
where
    T: AsyncRead + AsyncWrite,
{
    Framed::new(io, LinesCodec::new_with_max_length(MAX_RPC_FRAME_LEN))
}

/// Serializes and sends one frame.
///
/// Frames the peer would refuse to decode are rejected here, before anything
/// is written, so the connection stays usable.
pub(crate) async fn send_frame<S, F>(sink: &mut S, frame: &F) -> BroadcastResult<()>
where
    S: Sink<String, Error = LinesCodecError> + Unpin,
    F: Serialize,
{
    let line = serde_json::to_string(frame)
        .map_err(|e| BroadcastError::Protocol(format!("encode frame: {}", e)))?;
    if line.len() > MAX_RPC_FRAME_LEN {
        return Err(BroadcastError::InvalidPayload(format!(
            "frame of {} bytes exceeds {} bytes",
            line.len(),
            MAX_RPC_FRAME_LEN
        )));
    }
    sink.send(line).await?;
    Ok(())
}

/// Reads one frame. Returns `Ok(None)` when the peer closed the connection.
pub(crate) async fn read_frame<S, F>(stream: &mut S) -> BroadcastResult<Option<F>>
where
    S: Stream<Item = Result<String, LinesCodecError>> + Unpin,
    F: DeserializeOwned,
{
    match stream.next().await {
        None => Ok(None),
        Some(Err(e)) => Err(e.into()),
        Some(Ok(line)) => serde_json::from_str(&line)
            .map(Some)
            .map_err(|e| BroadcastError::Protocol(format!("decode frame: {}", e))),
    }
}

/// Compares two tokens without short-circuiting on the first mismatch.
pub(crate) fn tokens_match(expected: &str, presented: &str) -> bool {
    let expected = expected.as_bytes();
    let presented = presented.as_bytes();
    let mut diff = expected.len() ^ presented.len();
    for i in 0..expected.len().max(presented.len()) {
        let a = expected.get(i).copied().unwrap_or(0);
        let b = presented.get(i).copied().unwrap_or(0);
        diff |= usize::from(a ^ b);
    }
    diff == 0
}
