// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use sa_keys_core::domain::config::{CredentialsSource, SaKeysConfig, TriggerPolicy};

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./sa-keys-config.yaml")]
        output: PathBuf,

        /// Include a finding trigger section
        #[arg(long)]
        with_trigger: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate {
            output,
            with_trigger,
        } => generate(&output, with_trigger),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SaKeysConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. SA_KEYS_CONFIG_PATH: {}",
            std::env::var("SA_KEYS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./sa-keys-config.yaml");
        println!("  4. ~/.sa-keys/config.yaml");
        println!("  5. /etc/sa-keys/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let gcp = &config.spec.gcp;
    println!("{}", "Google Cloud:".bold());
    println!("  Project: {}", config.project_id().unwrap_or("(not set)"));
    println!("  IAM endpoint: {}", gcp.iam_endpoint);
    println!("  Secret Manager endpoint: {}", gcp.secret_manager_endpoint);
    println!("  Request timeout: {}s", gcp.request_timeout_seconds);
    println!("  Credentials: {}", describe_credentials(&gcp.credentials));
    println!();

    println!("{}", "Rotation:".bold());
    println!("  Max workers: {}", config.spec.workers.max_workers);
    println!(
        "  Secret name prefix: {}",
        if config.spec.rotation.secret_name_prefix.is_empty() {
            "(none)"
        } else {
            &config.spec.rotation.secret_name_prefix
        }
    );
    println!(
        "  Delete keys older than: {} days",
        config.spec.rotation.delete_keys_days_old
    );
    println!();

    println!("{}", "Finding trigger:".bold());
    match &config.spec.trigger {
        Some(trigger) => {
            println!(
                "  Service accounts: {}",
                trigger.service_account_regex.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  Projects: {}",
                trigger.project_id_regex.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  Secret project: {}",
                trigger.secret_manager_project_id.as_deref().unwrap_or("(not set)")
            );
        }
        None => println!("  {}", "(disabled)".dimmed()),
    }
    println!();

    let network = &config.spec.network;
    let obs = &config.spec.observability;
    println!("{}", "Service:".bold());
    println!("  Listen: {}:{}", network.bind_address, network.port);
    println!("  Log: {} ({})", obs.logging.level, obs.logging.format);
    if obs.metrics.enabled {
        println!("  Metrics: :{}/metrics", obs.metrics.port);
    } else {
        println!("  Metrics: {}", "(disabled)".dimmed());
    }

    Ok(())
}

fn describe_credentials(credentials: &CredentialsSource) -> String {
    match credentials {
        CredentialsSource::Auto => "auto".to_string(),
        CredentialsSource::Metadata => "metadata server".to_string(),
        CredentialsSource::ServiceAccountFile { path } => {
            format!("service account file {}", path.display())
        }
        CredentialsSource::StaticToken { token } if token.starts_with("env:") => {
            format!("static token from {}", token)
        }
        CredentialsSource::StaticToken { .. } => "static token".to_string(),
    }
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config =
        SaKeysConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Default configuration, optionally with a placeholder trigger section.
pub fn sample_config(with_trigger: bool) -> SaKeysConfig {
    let mut config = SaKeysConfig::default();
    config.metadata.name = "sa-keys".to_string();
    config.spec.gcp.project_id = Some("my-secrets-project".to_string());
    if with_trigger {
        config.spec.trigger = Some(TriggerPolicy {
            service_account_regex: Some("^ci-.*@".to_string()),
            project_id_regex: Some("^my-.*".to_string()),
            secret_manager_project_id: Some("my-secrets-project".to_string()),
            secret_name_prefix: String::new(),
            delete_keys_days_old: 7.0,
        });
    }
    config
}

fn generate(output: &Path, with_trigger: bool) -> Result<()> {
    sample_config(with_trigger)
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
