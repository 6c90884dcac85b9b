// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # sa-keys
//!
//! Rotates Google Cloud service-account keys into Secret Manager and audits
//! the secrets that hold them.
//!
//! ## Commands
//!
//! - `sa-keys serve [--in-memory]` - HTTP service
//! - `sa-keys rotate SAS [--prefix P] [--project P] [--days N]` - One-shot rotation
//! - `sa-keys audit --secret-regex RE [--project P]` - Audit stored keys
//! - `sa-keys keys list|older|delete|prune` - Key inspection and deletion
//! - `sa-keys config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use sa_keys::commands::{self, AuditArgs, ConfigCommand, KeysCommand, RotateArgs, ServeArgs};
use sa_keys_core::domain::config::SaKeysConfig;

/// sa-keys - service-account key rotation
#[derive(Parser)]
#[command(name = "sa-keys")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SA_KEYS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// HTTP listen port (default: spec.network.port)
    #[arg(long, global = true, env = "SA_KEYS_PORT")]
    port: Option<u16>,

    /// HTTP listen address (default: spec.network.bind_address)
    #[arg(long, global = true, env = "SA_KEYS_HOST")]
    host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SA_KEYS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (text, json; default: spec.observability.logging.format)
    #[arg(long, global = true, env = "SA_KEYS_LOG_FORMAT")]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Rotate keys for a comma-separated list of service accounts
    #[command(name = "rotate")]
    Rotate(RotateArgs),

    /// Audit key secrets against live keys
    #[command(name = "audit")]
    Audit(AuditArgs),

    /// Key inspection and deletion
    #[command(name = "keys")]
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let format = cli.log_format.clone().unwrap_or_else(|| {
        SaKeysConfig::load_or_default(cli.config.clone())
            .map(|c| c.spec.observability.logging.format)
            .unwrap_or_else(|_| "text".to_string())
    });
    init_logging(&cli.log_level, &format)?;

    match cli.command {
        Some(Commands::Serve(args)) => {
            commands::serve::run(args, cli.config, cli.host, cli.port).await
        }
        Some(Commands::Rotate(args)) => commands::rotate::run(args, cli.config).await,
        Some(Commands::Audit(args)) => commands::audit::run(args, cli.config).await,
        Some(Commands::Keys { command }) => {
            commands::keys::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        "json" => builder.json().init(),
        _ => builder.with_target(false).compact().init(),
    }

    Ok(())
}
