//! # canteen
//!
//! Canteen notification server binary: loads settings, wires the push
//! fallback and starts the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use canteen_logging::{LogFormat, init_subscriber};
use canteen_platform::push::{
    HttpPushGateway, InMemorySubscriptionStore, PushConfig, PushFallbackNotifier,
};
use canteen_server::config::ServerConfig;
use canteen_server::server::CanteenServer;
use canteen_settings::{CanteenSettings, LogLevel};
use clap::Parser;

/// Canteen real-time notification server.
#[derive(Parser, Debug)]
#[command(name = "canteen", about = "Canteen real-time notification server")]
struct Cli {
    /// Settings file (defaults to `~/.canteen/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Log level: error, warn, info, debug or trace.
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn load_settings(&self) -> Result<CanteenSettings> {
        match &self.config {
            Some(path) => canteen_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display())),
            None => canteen_settings::load_settings().context("Failed to load settings"),
        }
    }

    /// Merge command-line overrides into the loaded settings.
    fn apply(&self, settings: &mut CanteenSettings) -> Result<()> {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level = LogLevel::parse(level)
                .with_context(|| format!("Unknown log level: {level}"))?;
        }
        if self.log_json {
            settings.logging.json = true;
        }
        Ok(())
    }
}

fn build_notifier(settings: &CanteenSettings) -> Result<PushFallbackNotifier> {
    let store = Arc::new(InMemorySubscriptionStore::new());
    let Some(config) = PushConfig::from_settings(&settings.push) else {
        tracing::info!("push fallback disabled");
        return Ok(PushFallbackNotifier::disabled(store));
    };
    let gateway = HttpPushGateway::new(config).context("Failed to build push gateway")?;
    tracing::info!("push fallback enabled");
    Ok(PushFallbackNotifier::new(store, Arc::new(gateway)))
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut settings = args.load_settings()?;
    args.apply(&mut settings)?;
    settings.validate().context("Invalid settings")?;

    init_subscriber(
        settings.logging.level.as_filter_str(),
        LogFormat::from_json_flag(settings.logging.json),
    );

    let metrics = match canteen_server::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let notifier = build_notifier(&settings)?;
    let config = ServerConfig::from_settings(&settings.server, &settings.push.default_title);
    let server = CanteenServer::new(config, notifier, metrics);

    let addr = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Canteen listening on http://{addr} (/kitchen, /users)");

    shutdown_signal().await?;

    tracing::info!("Shutting down...");
    server.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
