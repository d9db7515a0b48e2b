// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Result};
use clap::Parser;
use mobilesam_segmentation::{
    api::{start_server, AppState},
    cli::Cli,
    config::ServiceConfig,
    version,
    vision::SegmentationModelManager,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚀 Starting {}", version::get_version_string());

    let mut config = ServiceConfig::from_env();
    cli.apply(&mut config);
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    info!("📦 Encoder: {}", config.mobile_sam.encoder_path.display());
    info!("📦 Decoder: {}", config.mobile_sam.decoder_path.display());

    let sam_config = config.mobile_sam.clone();
    let manager =
        tokio::task::spawn_blocking(move || SegmentationModelManager::new(&sam_config)).await?;

    if !manager.has_model() {
        warn!("⚠️  Starting without a segmentation model, /segment-image will return 503");
    }

    let state = AppState::new(config, manager);
    start_server(state).await?;

    info!("👋 Goodbye!");
    Ok(())
}
