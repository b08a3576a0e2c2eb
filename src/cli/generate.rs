// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::{BackendKind, PipelineConfig};
use crate::intake::{codec, Intake, RawRequestPayload};
use crate::mapping::ParameterMapper;
use crate::pipeline::Pipeline;

/// Arguments for generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Input image file (png, jpeg, webp, gif, bmp)
    #[arg(long)]
    pub image: PathBuf,

    /// Prompt text
    #[arg(long)]
    pub text: Option<String>,

    /// Temperature label, e.g. "Temperature: 25°C"
    #[arg(long)]
    pub temperature: Option<String>,

    /// Humidity label, e.g. "Humidity: 50%"
    #[arg(long)]
    pub humidity: Option<String>,

    /// Mapping policy (prompt_augmentation, deterministic_seed, linear_mapping)
    #[arg(long, env = "SELECTED_APPROACH")]
    pub policy: Option<String>,

    /// Output PNG path
    #[arg(long, default_value = "output.png")]
    pub out: PathBuf,

    /// Optional TOML configuration file
    #[arg(long, env = "MIRROR_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Arguments for params command
#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// Temperature label, e.g. "Temperature: 25°C"
    #[arg(long)]
    pub temperature: String,

    /// Humidity label, e.g. "Humidity: 50%"
    #[arg(long)]
    pub humidity: String,

    /// Prompt text
    #[arg(long)]
    pub text: Option<String>,

    /// Mapping policy (prompt_augmentation, deterministic_seed, linear_mapping)
    #[arg(long, env = "SELECTED_APPROACH")]
    pub policy: Option<String>,
}

pub async fn generate(args: GenerateArgs) -> Result<()> {
    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(policy) = args.policy {
        config.selected_approach = policy;
    }
    if config.backend != BackendKind::Local {
        warn!("generate always runs the local backend; ignoring backend={:?}", config.backend);
        config.backend = BackendKind::Local;
    }
    let pipeline = Pipeline::from_config(&config)?;

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("reading {}", args.image.display()))?;
    let mut payload = RawRequestPayload::new(STANDARD.encode(&bytes));
    payload.text = args.text;
    payload.temperature = args.temperature;
    payload.humidity = args.humidity;

    let outcome = pipeline.process(payload).await?;
    let png = codec::encode_png(&outcome.result.output_image)?;
    tokio::fs::write(&args.out, &png)
        .await
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!("Wrote {} ({} bytes)", args.out.display(), png.len());

    let summary = json!({
        "output": args.out.display().to_string(),
        "policy": pipeline.policy().as_str(),
        "parameters": outcome.result.parameters_used,
        "backend": outcome.result.backend,
        "duration_ms": outcome.result.duration_ms,
        "published": outcome.published(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Err(e) = outcome.publish {
        warn!("Result written locally but not published: {}", e);
    }
    Ok(())
}

pub fn params(args: ParamsArgs) -> Result<()> {
    let mapper = match args.policy {
        Some(ref name) => ParameterMapper::from_name(name)?,
        None => ParameterMapper::default(),
    };
    let fields = Intake::default().parse_fields(
        args.text.as_deref(),
        Some(args.temperature.as_str()),
        Some(args.humidity.as_str()),
    )?;
    let parameters = mapper.map(&fields.prompt_text, fields.readings)?;

    let output = json!({
        "policy": mapper.policy().as_str(),
        "temperature_c": fields.readings.temperature_c,
        "humidity_pct": fields.readings.humidity_pct,
        "parameters": parameters,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
