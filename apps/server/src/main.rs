//! Interaktiv Server - standalone backend for interactive live presentations.
//!
//! By default this binary serves the presentation files, the participation
//! API and the event stream. The `broadcaster` subcommand runs only the
//! broadcast service, for deployments where HTTP servers connect to it in
//! `external` mode.

mod config;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use interaktiv_core::{
    bootstrap_services, bootstrap_services_with_network, generate_token, start_server, Announcer,
    AppState, BroadcastMode, BroadcastServer, NetworkContext,
};
use parking_lot::RwLock;
use tokio::signal;

use crate::config::ServerConfig;

/// Interaktiv Server - live presentation backend.
#[derive(Parser, Debug)]
#[command(name = "interaktiv-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(
        short,
        long,
        default_value = "info",
        env = "INTERAKTIV_LOG_LEVEL",
        global = true
    )]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "INTERAKTIV_BIND_PORT", global = true)]
    port: Option<u16>,

    /// Advertise IP address (overrides config file).
    #[arg(short = 'a', long, env = "INTERAKTIV_ADVERTISE_IP", global = true)]
    advertise_ip: Option<std::net::IpAddr>,

    /// Presentation served at `/` (overrides config file).
    #[arg(short = 'n', long, env = "PRESENTATION_NAME", global = true)]
    presentation: Option<String>,

    /// Broadcast mode: local, worker or external (overrides config file).
    #[arg(short = 'm', long, env = "INTERAKTIV_BROADCAST_MODE", global = true)]
    broadcast_mode: Option<BroadcastMode>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the presentation, API and event stream (default).
    Serve,
    /// Run only the broadcast service on the loopback RPC port.
    Broadcaster,
    /// Check a running server's health endpoint.
    Probe {
        /// Base URL of the server (defaults to the configured local port).
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    // Load configuration
    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(ip) = args.advertise_ip {
        config.advertise_ip = Some(ip);
    }
    if let Some(name) = args.presentation {
        config.presentation_name = Some(name);
    }
    if let Some(mode) = args.broadcast_mode {
        config.broadcast.mode = mode;
    }

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Broadcaster => run_broadcaster(config).await,
        Command::Probe { url } => probe(&config, url).await,
    }
}

/// Runs the HTTP server until a shutdown signal arrives.
async fn serve(config: ServerConfig) -> Result<()> {
    log::info!("Interaktiv Server v{}", env!("CARGO_PKG_VERSION"));

    let core_config = config.to_core_config();
    log::info!(
        "Configuration: bind_port={}, index={}, static_dir={}, broadcast={}",
        core_config.preferred_port,
        core_config.index_file(),
        core_config.static_dir.display(),
        core_config.broadcast.mode
    );

    let services = match config.advertise_ip {
        Some(ip) => {
            let network = NetworkContext::explicit(config.bind_port, ip);
            bootstrap_services_with_network(&core_config, network).await
        }
        None => bootstrap_services(&core_config).await,
    }
    .context("Failed to bootstrap services")?;

    log::info!("Services bootstrapped successfully");

    let app_state = AppState::new(&services, Arc::new(RwLock::new(core_config)));

    let mut server_handle = tokio::spawn(async move { start_server(app_state).await });

    // Wait for shutdown signal, or the server failing on its own
    let server_result = tokio::select! {
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, cleaning up...");
            None
        }
        result = &mut server_handle => Some(result),
    };

    // Graceful shutdown: open event streams end, then the server drains
    services.shutdown().await;

    let result = match server_result {
        Some(result) => result,
        None => server_handle.await,
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e).context("HTTP server failed"),
        Err(e) => bail!("HTTP server task failed: {}", e),
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Runs a standalone broadcaster for HTTP servers in `external` mode.
async fn run_broadcaster(config: ServerConfig) -> Result<()> {
    let token = match config.broadcast.token.clone() {
        Some(token) => token,
        None => {
            let token = generate_token();
            log::warn!(
                "No broadcast token configured, generated one: {} \
                 (set INTERAKTIV_BROADCAST_TOKEN on the HTTP servers)",
                token
            );
            token
        }
    };

    let announcer = Arc::new(Announcer::with_queue_capacity(
        config.broadcast.queue_capacity,
    ));
    let server = BroadcastServer::new(announcer, token);
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.broadcast.port));
    let cancel = server.cancel_token();

    log::info!("Interaktiv broadcaster v{}", env!("CARGO_PKG_VERSION"));

    let serving = server.serve(addr);
    tokio::pin!(serving);

    tokio::select! {
        result = &mut serving => {
            result.with_context(|| format!("Broadcaster on {} failed", addr))?;
        }
        _ = shutdown_signal() => {
            log::info!("Shutdown signal received, stopping broadcaster...");
            cancel.cancel();
            serving.await.with_context(|| format!("Broadcaster on {} failed", addr))?;
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Probes `/health` of a running server.
async fn probe(config: &ServerConfig, url: Option<String>) -> Result<()> {
    let base = url.unwrap_or_else(|| format!("http://127.0.0.1:{}", config.bind_port));
    let health = format!("{}/health", base.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(&health)
        .send()
        .await
        .with_context(|| format!("Server at {} is not reachable", base))?;

    let status = response.status();
    if !status.is_success() {
        bail!("{} returned {}", health, status);
    }

    let body: serde_json::Value = response
        .json()
        .await
        .context("Health response is not JSON")?;
    log::info!(
        "{} is {} (version {})",
        base,
        body["status"].as_str().unwrap_or("unknown"),
        body["version"].as_str().unwrap_or("unknown")
    );
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
