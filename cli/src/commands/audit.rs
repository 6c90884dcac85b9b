// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Audit stored key secrets against live keys

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use sa_keys_core::application::{SecretAuditor, WorkerPool};
use sa_keys_core::domain::outcome::{AuditReport, Severity};

use super::{load_config, print_json, print_status, Ports};

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// Regex matched (unanchored) against secret ids
    #[arg(long = "secret-regex", value_name = "REGEX")]
    pub secret_regex: String,

    /// Project that holds the secrets (default: spec.gcp.project_id)
    #[arg(long)]
    pub project: Option<String>,
}

pub async fn run(args: AuditArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let project = args
        .project
        .or_else(|| config.project_id().map(str::to_string))
        .context("No project given and spec.gcp.project_id is not set")?;
    let ports = Ports::google(&config)?;

    let auditor = SecretAuditor::new(
        ports.identity,
        ports.store,
        WorkerPool::new(config.spec.workers.max_workers),
    );
    let report = auditor
        .audit_project(&project, &args.secret_regex)
        .await
        .context("Audit failed")?;

    print_json(&report)?;
    print_findings(&report);
    print_status("Audit", report.status);
    Ok(())
}

fn print_findings(report: &AuditReport) {
    for audit in &report.results {
        let message = audit
            .message
            .as_deref()
            .or(audit.error.as_deref())
            .unwrap_or_default();
        let line = format!("{}: {}", audit.secret_id, message);
        match audit.severity {
            Some(Severity::Warning) => eprintln!("  {}", line.yellow()),
            Some(Severity::Notice) => eprintln!("  {}", line.dimmed()),
            None => eprintln!("  {}", line.red()),
        }
    }
}
