//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use interaktiv_core::{BroadcastConfig, BroadcastMode, SseConfig};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to bind the HTTP server to (0 = auto-allocate).
    /// Override: `INTERAKTIV_BIND_PORT`
    pub bind_port: u16,

    /// IP address handed out to the audience via `/ipsocket`.
    /// If not specified, auto-detection will be attempted.
    /// Override: `INTERAKTIV_ADVERTISE_IP`
    pub advertise_ip: Option<IpAddr>,

    /// Presentation served at `/` (`<name>.html`).
    /// Override: `PRESENTATION_NAME`
    pub presentation_name: Option<String>,

    /// Directory holding the presentation files.
    /// Override: `INTERAKTIV_STATIC_DIR`
    pub static_dir: PathBuf,

    /// Broadcast mode, loopback port, token and mailbox capacity.
    /// Overrides: `INTERAKTIV_BROADCAST_MODE`, `INTERAKTIV_BROADCAST_PORT`,
    /// `INTERAKTIV_BROADCAST_TOKEN`
    pub broadcast: BroadcastConfig,

    /// SSE keepalive frames.
    /// Override: `INTERAKTIV_SSE_KEEPALIVE`
    pub sse: SseConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core = interaktiv_core::Config::default();
        Self {
            bind_port: core.preferred_port,
            advertise_ip: None,
            presentation_name: None,
            static_dir: core.static_dir,
            broadcast: core.broadcast,
            sse: core.sse,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        // An empty file is a valid "all defaults" configuration
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    ///
    /// Unparseable values are ignored with a warning.
    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("INTERAKTIV_BIND_PORT") {
            match val.parse() {
                Ok(port) => self.bind_port = port,
                Err(_) => log::warn!("Ignoring invalid INTERAKTIV_BIND_PORT: {}", val),
            }
        }

        if let Some(val) = var("INTERAKTIV_ADVERTISE_IP") {
            match val.parse() {
                Ok(ip) => self.advertise_ip = Some(ip),
                Err(_) => log::warn!("Ignoring invalid INTERAKTIV_ADVERTISE_IP: {}", val),
            }
        }

        if let Some(val) = var("PRESENTATION_NAME") {
            self.presentation_name = Some(val);
        }

        if let Some(val) = var("INTERAKTIV_STATIC_DIR") {
            self.static_dir = PathBuf::from(val);
        }

        if let Some(val) = var("INTERAKTIV_BROADCAST_MODE") {
            match val.parse::<BroadcastMode>() {
                Ok(mode) => self.broadcast.mode = mode,
                Err(e) => log::warn!("Ignoring INTERAKTIV_BROADCAST_MODE: {}", e),
            }
        }

        if let Some(val) = var("INTERAKTIV_BROADCAST_PORT") {
            match val.parse() {
                Ok(port) => self.broadcast.port = port,
                Err(_) => log::warn!("Ignoring invalid INTERAKTIV_BROADCAST_PORT: {}", val),
            }
        }

        if let Some(val) = var("INTERAKTIV_BROADCAST_TOKEN") {
            if !val.is_empty() {
                self.broadcast.token = Some(val);
            }
        }

        if let Some(val) = var("INTERAKTIV_SSE_KEEPALIVE") {
            match parse_flag(&val) {
                Some(flag) => self.sse.keepalive = flag,
                None => log::warn!("Ignoring invalid INTERAKTIV_SSE_KEEPALIVE: {}", val),
            }
        }
    }

    /// Converts to interaktiv-core's Config type.
    pub fn to_core_config(&self) -> interaktiv_core::Config {
        interaktiv_core::Config {
            preferred_port: self.bind_port,
            presentation_name: self.presentation_name.clone(),
            static_dir: self.static_dir.clone(),
            broadcast: self.broadcast.clone(),
            sse: self.sse.clone(),
        }
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_port, 5050);
        assert_eq!(config.static_dir, PathBuf::from("./docs"));
        assert_eq!(config.broadcast.mode, BroadcastMode::Local);
        assert_eq!(config.broadcast.port, 2437);
        assert!(!config.sse.keepalive);
    }

    #[test]
    fn loads_nested_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interaktiv.yaml");
        std::fs::write(
            &path,
            "bind_port: 8080\n\
             presentation_name: vortrag\n\
             broadcast:\n  mode: worker\n  queue_capacity: 64\n\
             sse:\n  keepalive: true\n",
        )
        .unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        let core = config.to_core_config();
        assert_eq!(core.preferred_port, 8080);
        assert_eq!(core.index_file(), "vortrag.html");
        assert_eq!(core.broadcast.mode, BroadcastMode::Worker);
        assert_eq!(core.broadcast.queue_capacity, Some(64));
        assert_eq!(core.broadcast.port, 2437);
        assert!(core.sse.keepalive);
        assert!(core.validate().is_ok());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = ServerConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.bind_port, 5050);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ServerConfig::load(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ServerConfig::default();
        config.apply_env_overrides(env(&[
            ("INTERAKTIV_BIND_PORT", "6060"),
            ("PRESENTATION_NAME", "demo"),
            ("INTERAKTIV_STATIC_DIR", "/srv/slides"),
            ("INTERAKTIV_BROADCAST_MODE", "External"),
            ("INTERAKTIV_BROADCAST_PORT", "3000"),
            ("INTERAKTIV_BROADCAST_TOKEN", "secret"),
            ("INTERAKTIV_SSE_KEEPALIVE", "yes"),
        ]));

        assert_eq!(config.bind_port, 6060);
        assert_eq!(config.presentation_name.as_deref(), Some("demo"));
        assert_eq!(config.static_dir, PathBuf::from("/srv/slides"));
        assert_eq!(config.broadcast.mode, BroadcastMode::External);
        assert_eq!(config.broadcast.port, 3000);
        assert_eq!(config.broadcast.token.as_deref(), Some("secret"));
        assert!(config.sse.keepalive);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut config = ServerConfig::default();
        config.apply_env_overrides(env(&[
            ("INTERAKTIV_BIND_PORT", "not-a-port"),
            ("INTERAKTIV_BROADCAST_MODE", "cluster"),
            ("INTERAKTIV_SSE_KEEPALIVE", "maybe"),
            ("INTERAKTIV_BROADCAST_TOKEN", ""),
        ]));

        assert_eq!(config.bind_port, 5050);
        assert_eq!(config.broadcast.mode, BroadcastMode::Local);
        assert!(!config.sse.keepalive);
        assert!(config.broadcast.token.is_none());
    }
}
