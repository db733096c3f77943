//! Server-Sent Events stream adapter.
//!
//! Each `GET /events` request subscribes one listener and turns its queued
//! events into SSE frames until the client goes away, the subscription ends
//! or the server shuts down.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderName};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::broadcast::{ListenerId, Subscription};
use crate::error::InteraktivResult;
use crate::events::Event;
use crate::protocol_constants::{SSE_CONTENT_TYPE, SSE_KEEPALIVE_FRAME};

/// Encodes one event as an SSE frame.
///
/// Unnamed events omit the `event:` line and land on the client's default
/// `message` channel. Line breaks in the name are dropped so a hostile id
/// cannot inject extra fields.
pub fn encode_event(event: &Event) -> Bytes {
    let mut frame = String::new();
    if let Some(name) = event.name() {
        frame.push_str("event: ");
        frame.extend(name.chars().filter(|c| *c != '\n' && *c != '\r'));
        frame.push('\n');
    }
    let data = event.payload().to_string();
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    Bytes::from(frame)
}

/// Logs the lifetime of one event stream.
struct StreamGuard {
    id: ListenerId,
    frames: u64,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        log::info!(
            "[SSE] {} disconnected after {} event(s)",
            self.id,
            self.frames
        );
    }
}

fn keepalive_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Turns a subscription into a stream of SSE frames.
///
/// The subscription is owned by the stream: when the HTTP layer drops the
/// body (client disconnect or write failure) the listener is unsubscribed.
pub fn event_stream(
    mut subscription: Subscription,
    keepalive: Option<Duration>,
    shutdown: CancellationToken,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        let mut guard = StreamGuard { id: subscription.id(), frames: 0 };
        let mut ticker = keepalive.map(keepalive_ticker);

        loop {
            let frame = tokio::select! {
                biased;

                _ = shutdown.cancelled() => None,

                event = subscription.next_event() => match event {
                    Some(event) => {
                        guard.frames += 1;
                        Some(encode_event(&event))
                    }
                    None => {
                        log::debug!("[SSE] {} subscription ended", guard.id);
                        None
                    }
                },

                _ = next_tick(&mut ticker) => Some(Bytes::from_static(SSE_KEEPALIVE_FRAME)),
            };

            match frame {
                Some(frame) => yield Ok(frame),
                None => break,
            }
        }
    }
}

/// `GET /events`: long-lived event stream.
pub async fn events_handler(State(state): State<AppState>) -> InteraktivResult<Response> {
    let subscription = state.broadcast.subscribe().await?;
    log::info!("[SSE] {} connected", subscription.id());

    let keepalive = state.config.read().sse.keepalive_interval();
    let body = Body::from_stream(event_stream(
        subscription,
        keepalive,
        state.shutdown.clone(),
    ));

    Ok((
        [
            (header::CONTENT_TYPE, SSE_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        body,
    )
        .into_response())
}
