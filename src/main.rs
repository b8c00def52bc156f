use std::path::PathBuf;

use anyhow::Context;
use bazaar_server::{balance, HubConfig};
use bazaar_settings::{load_settings, load_settings_from_path};
use bazaar_telemetry::{init_telemetry, TelemetryConfig};
use clap::Parser;

/// Real-time negotiation hub.
#[derive(Debug, Parser)]
#[command(name = "bazaar", version, about)]
struct Cli {
    /// Settings file (defaults to ~/.bazaar/settings.json).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bind host, overriding settings.
    #[arg(long)]
    host: Option<String>,
    /// Bind port, overriding settings.
    #[arg(long)]
    port: Option<u16>,
    /// Emit JSON log lines.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => load_settings().context("failed to load settings")?,
    };
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    let telemetry =
        TelemetryConfig::from_level_str(&settings.logging.level, settings.logging.json || cli.log_json)?;
    init_telemetry(&telemetry)?;

    tracing::info!("starting bazaar hub");

    let config = HubConfig::from(&settings);
    let balances = balance::from_url(config.balance_url.as_deref(), config.balance_timeout)?;
    if balances.is_some() {
        tracing::info!(url = config.balance_url.as_deref().unwrap_or(""), "balance lookups enabled");
    }

    let handle = bazaar_server::start(config, balances)
        .await
        .context("failed to start server")?;
    tracing::info!(addr = %handle.addr(), "bazaar hub ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    let _ = handle.shutdown(None).await;
    Ok(())
}
