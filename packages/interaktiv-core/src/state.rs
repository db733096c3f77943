//! Core configuration types.
//!
//! [`Config`] is assembled by the server binary from YAML, environment and
//! CLI overrides, then handed to [`bootstrap_services`](crate::bootstrap_services).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol_constants::{
    DEFAULT_BROADCAST_PORT, DEFAULT_HTTP_PORT, DEFAULT_INDEX_FILE, DEFAULT_SSE_KEEPALIVE_SECS,
};

/// Where the announcer lives relative to the HTTP server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// In-process announcer shared by all handlers.
    #[default]
    Local,
    /// Broadcaster RPC server on a dedicated runtime thread in this process.
    Worker,
    /// Broadcaster started separately (`interaktiv-server broadcaster`).
    External,
}

impl BroadcastMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Worker => "worker",
            Self::External => "external",
        }
    }
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BroadcastMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "worker" => Ok(Self::Worker),
            "external" => Ok(Self::External),
            other => Err(format!(
                "unknown broadcast mode '{}' (expected local, worker or external)",
                other
            )),
        }
    }
}

/// Broadcast service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub mode: BroadcastMode,

    /// Loopback port of the RPC endpoint (worker and external modes).
    pub port: u16,

    /// Shared token for the RPC handshake.
    ///
    /// Required in external mode; generated when absent in worker mode.
    pub token: Option<String>,

    /// Per-listener mailbox capacity. `None` means unbounded; when set, a
    /// full mailbox drops new events for that listener only.
    pub queue_capacity: Option<usize>,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            mode: BroadcastMode::Local,
            port: DEFAULT_BROADCAST_PORT,
            token: None,
            queue_capacity: None,
        }
    }
}

/// Event stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SseConfig {
    /// Emit keepalive comment frames on idle streams.
    pub keepalive: bool,

    /// Interval between keepalive frames (seconds).
    pub keepalive_interval_secs: u64,
}

impl SseConfig {
    /// Returns the keepalive interval, or `None` when keepalive is off.
    #[must_use]
    pub fn keepalive_interval(&self) -> Option<Duration> {
        self.keepalive
            .then(|| Duration::from_secs(self.keepalive_interval_secs))
    }
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            keepalive: false,
            keepalive_interval_secs: DEFAULT_SSE_KEEPALIVE_SECS,
        }
    }
}

/// Configuration for the Interaktiv server.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preferred port for the HTTP server (0 = auto-allocate).
    pub preferred_port: u16,

    /// Presentation to serve at `/` (`<name>.html` in the static directory).
    pub presentation_name: Option<String>,

    /// Directory holding the presentation HTML and assets.
    pub static_dir: PathBuf,

    pub broadcast: BroadcastConfig,

    pub sse: SseConfig,
}

impl Config {
    /// Returns the document served at `/`.
    #[must_use]
    pub fn index_file(&self) -> String {
        match self.presentation_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                if name.ends_with(".html") {
                    name.to_string()
                } else {
                    format!("{}.html", name)
                }
            }
            _ => DEFAULT_INDEX_FILE.to_string(),
        }
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.broadcast.mode == BroadcastMode::External && self.broadcast.port == 0 {
            return Err("broadcast.port must be set in external mode".to_string());
        }
        if self.broadcast.mode == BroadcastMode::External
            && self.broadcast.token.as_deref().map_or(true, str::is_empty)
        {
            return Err("broadcast.token is required in external mode".to_string());
        }
        if self.broadcast.queue_capacity == Some(0) {
            return Err("broadcast.queue_capacity must be >= 1".to_string());
        }
        if self.sse.keepalive && self.sse.keepalive_interval_secs == 0 {
            return Err("sse.keepalive_interval_secs must be >= 1".to_string());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            preferred_port: DEFAULT_HTTP_PORT,
            presentation_name: None,
            static_dir: PathBuf::from("./docs"),
            broadcast: BroadcastConfig::default(),
            sse: SseConfig::default(),
        }
    }
}
