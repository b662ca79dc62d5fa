use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};
use checkout_probe::metrics;

pub async fn run() -> Result<()> {
    load_local_env_overrides();
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_json)?;
    network_tap::metrics::reset();
    metrics::register_metrics();

    info!(
        "Starting checkout-probe v{} ({} built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_DATE")
    );

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    let cli_context = CliContext::new(config, path, cli.output.clone())?;

    let result = dispatch(&cli, &cli_context).await;

    if let Some(metrics_path) = cli.metrics_file.as_ref() {
        let text = metrics::render_text().context("Failed to encode metrics")?;
        tokio::fs::write(metrics_path, text)
            .await
            .with_context(|| format!("Failed to write metrics to {}", metrics_path.display()))?;
        info!(path = %metrics_path.display(), "metrics written");
    }

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
