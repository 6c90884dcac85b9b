// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Key inspection and deletion
//!
//! Commands: list, older, delete, prune

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use sa_keys_core::application::{DeletionReport, KeyReaper};
use sa_keys_core::domain::key::{validate_age_days, KeyRecord};
use sa_keys_core::domain::principal::ServiceAccount;

use super::{load_config, print_json, print_status, Ports};

#[derive(Subcommand, Debug, Clone)]
pub enum KeysCommand {
    /// List every key of a service account
    List {
        #[arg(value_name = "SERVICE_ACCOUNT")]
        service_account: String,
    },

    /// List user-managed keys older than DAYS
    Older {
        #[arg(value_name = "SERVICE_ACCOUNT")]
        service_account: String,
        #[arg(value_name = "DAYS")]
        days: f64,
    },

    /// Delete keys by full resource name, in order, stopping at the first failure
    Delete {
        #[arg(value_name = "KEY_NAME", value_delimiter = ',', required = true)]
        names: Vec<String>,
    },

    /// Delete user-managed keys older than DAYS
    Prune {
        #[arg(value_name = "SERVICE_ACCOUNT")]
        service_account: String,
        #[arg(value_name = "DAYS")]
        days: f64,
    },
}

pub async fn handle_command(command: KeysCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let reaper = KeyReaper::new(Ports::google(&config)?.identity);

    match command {
        KeysCommand::List { service_account } => {
            let sa = parse_account(&service_account)?;
            let keys = reaper.list_keys(&sa).await.context("Failed to list keys")?;
            print_keys(&keys)
        }
        KeysCommand::Older {
            service_account,
            days,
        } => {
            let sa = parse_account(&service_account)?;
            let days = validate_age_days(days)?;
            let keys = reaper
                .keys_older_than(&sa, days)
                .await
                .context("Failed to list keys")?;
            print_keys(&keys)
        }
        KeysCommand::Delete { names } => {
            let names: Vec<String> = names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            let report = reaper.delete_keys(&names).await?;
            finish(report)
        }
        KeysCommand::Prune {
            service_account,
            days,
        } => {
            let sa = parse_account(&service_account)?;
            let days = validate_age_days(days)?;
            let report = reaper.delete_keys_older_than(&sa, days).await?;
            finish(report)
        }
    }
}

fn parse_account(email: &str) -> Result<ServiceAccount> {
    ServiceAccount::parse(email).with_context(|| format!("Invalid service account '{}'", email))
}

fn print_keys(keys: &[KeyRecord]) -> Result<()> {
    print_json(&keys)?;
    eprintln!("{}", format!("{} key(s)", keys.len()).dimmed());
    Ok(())
}

fn finish(report: DeletionReport) -> Result<()> {
    print_json(&report)?;
    print_status("Deletion", report.status());
    if !report.is_complete() {
        anyhow::bail!(
            "Deleted {} key(s) before a failure; {} not attempted",
            report.deleted.len(),
            report.not_attempted.len()
        );
    }
    Ok(())
}
