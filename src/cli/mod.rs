// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod generate;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Mirror generation node CLI
#[derive(Parser, Debug)]
#[command(name = "mirror-cli")]
#[command(version)]
#[command(about = "Run the environment-conditioned generation pipeline from the command line", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stylize one image with the local backend and write the result
    Generate(generate::GenerateArgs),

    /// Print the generation parameters for a set of readings
    Params(generate::ParamsArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate(args) => generate::generate(args).await,
        Commands::Params(args) => generate::params(args),
    }
}
