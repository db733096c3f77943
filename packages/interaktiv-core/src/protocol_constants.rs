//! Fixed protocol constants that should NOT be changed.
//!
//! Event names are matched by the presentation frontend, and the RPC framing
//! values are shared between the broadcaster and every client process.

// ─────────────────────────────────────────────────────────────────────────────
// Server-Sent Events
// ─────────────────────────────────────────────────────────────────────────────

/// MIME type of the event stream.
pub const SSE_CONTENT_TYPE: &str = "text/event-stream";

/// Comment frame emitted as keepalive when enabled.
///
/// Lines starting with `:` are ignored by `EventSource` clients, so this only
/// keeps intermediary proxies from closing an idle connection.
pub const SSE_KEEPALIVE_FRAME: &[u8] = b": ping\n\n";

/// Default interval between keepalive frames (seconds).
pub const DEFAULT_SSE_KEEPALIVE_SECS: u64 = 15;

// ─────────────────────────────────────────────────────────────────────────────
// Event Names
// ─────────────────────────────────────────────────────────────────────────────

/// Broadcast when the set of registered nicknames changes.
pub const NICKNAME_EVENT: &str = "NICKNAME";

/// Broadcast by the `/ping` diagnostic endpoint.
pub const PING_EVENT: &str = "PING";

/// Payload of the ping event.
pub const PING_PAYLOAD: &str = "Pinged";

/// Prefix for per-question events (Likert scales and free-text answers).
///
/// The frontend routes `A-<id>` events to the widget with that id.
pub const ANSWER_EVENT_PREFIX: &str = "A-";

// ─────────────────────────────────────────────────────────────────────────────
// Broadcast RPC
// ─────────────────────────────────────────────────────────────────────────────

/// Default loopback port of the broadcast service.
pub const DEFAULT_BROADCAST_PORT: u16 = 2437;

/// Maximum length of a single RPC frame (bytes, excluding the newline).
///
/// Answer events carry every answer to a question, each up to
/// [`MAX_JSON_BODY_SIZE`] bytes, so this must stay far above the body limit.
pub const MAX_RPC_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Backoff delays when connecting to a broadcaster that is not up yet.
pub const RPC_CONNECT_RETRY_DELAYS_MS: [u64; 4] = [200, 500, 1000, 2000];

/// How long an in-process client waits for the broadcaster readiness signal.
pub const BROADCAST_READY_TIMEOUT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

/// Default HTTP port of the presentation server.
pub const DEFAULT_HTTP_PORT: u16 = 5050;

/// Index document served at `/` when no presentation name is configured.
pub const DEFAULT_INDEX_FILE: &str = "index.html";

/// Cache policy for static presentation assets.
pub const STATIC_CACHE_CONTROL: &str = "public, max-age=31536000";

/// Maximum accepted size of a JSON request body (bytes).
pub const MAX_JSON_BODY_SIZE: usize = 16 * 1024;
