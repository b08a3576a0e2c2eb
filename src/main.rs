// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use mirror_gen_node::{api, config::PipelineConfig, pipeline::Pipeline, version};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting {}", version::get_version_string());

    let config_path = env::var("MIRROR_CONFIG").ok().map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref()).context("loading configuration")?;
    info!(
        "Configuration: backend={:?}, model={}, approach={}, publisher={:?}, sensor={:?}",
        config.backend,
        config.selected_model,
        config.selected_approach,
        config.publisher.kind,
        config.sensor.kind
    );

    let pipeline = Pipeline::from_config(&config).context("building pipeline")?;
    if !pipeline.health_check().await {
        tracing::warn!("Backend {} failed its startup health check", pipeline.backend_name());
    }

    api::start_server(pipeline, &config.server).await?;
    info!("Shutdown complete");
    Ok(())
}
