// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use lava_cli::commands;
use lava_cli::commands::render::RenderOptions;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lava")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Render and rewrite Lava templates", long_about = None)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Configuration file (defaults to ./lava.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template
    Render {
        /// Template file
        template: PathBuf,
        /// JSON file with merge fields
        #[arg(short, long)]
        data: Option<PathBuf>,
        /// Enable a Lava command (repeatable)
        #[arg(short, long = "enable-command")]
        enable_command: Vec<String>,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the Liquid form of a template
    Rewrite {
        /// Template file
        template: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Render {
            template,
            data,
            enable_command,
            output,
        } => commands::render::run(
            RenderOptions {
                template,
                data,
                enable_commands: enable_command,
                output,
            },
            config,
        ),
        Commands::Rewrite { template } => commands::rewrite::run(&template, config),
    }
}
