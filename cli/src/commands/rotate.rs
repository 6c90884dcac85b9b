// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! One-shot rotation from the command line

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use sa_keys_core::application::{BatchCoordinator, RotationRequest, WorkerPool};
use sa_keys_core::domain::config::SaKeysConfig;

use super::{load_config, print_json, print_status, Ports};

#[derive(Args, Debug, Clone)]
pub struct RotateArgs {
    /// Comma-separated service account emails
    #[arg(value_name = "SERVICE_ACCOUNTS")]
    pub service_accounts: String,

    /// Prefix for generated secret ids (default: spec.rotation.secret_name_prefix)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Project that holds the secrets (default: spec.gcp.project_id)
    #[arg(long)]
    pub project: Option<String>,

    /// Delete user-managed keys older than this many days; 0 keeps them
    /// (default: spec.rotation.delete_keys_days_old)
    #[arg(long)]
    pub days: Option<f64>,
}

impl RotateArgs {
    /// Fill unset options from configuration.
    pub fn to_request(&self, config: &SaKeysConfig) -> Result<RotationRequest> {
        let prefix = self
            .prefix
            .clone()
            .unwrap_or_else(|| config.spec.rotation.secret_name_prefix.clone());
        let project = self
            .project
            .clone()
            .or_else(|| config.project_id().map(str::to_string))
            .context("No project given and spec.gcp.project_id is not set")?;
        let days = self
            .days
            .unwrap_or(config.spec.rotation.delete_keys_days_old);

        RotationRequest::parse(&self.service_accounts, Some(&prefix), &project, days)
            .context("Invalid rotation request")
    }
}

pub async fn run(args: RotateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let request = args.to_request(&config)?;
    let ports = Ports::google(&config)?;

    let coordinator = BatchCoordinator::new(
        ports.identity,
        ports.store,
        WorkerPool::new(config.spec.workers.max_workers),
    );
    let report = coordinator.rotate(request).await;

    print_json(&report)?;
    print_status("Rotation", report.status);
    if report.status != 200 {
        let failed = report.results.iter().filter(|r| !r.is_success()).count();
        anyhow::bail!("{} of {} service accounts failed", failed, report.results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SaKeysConfig {
        let mut config = SaKeysConfig::default();
        config.spec.gcp.project_id = Some("vault".to_string());
        config.spec.rotation.secret_name_prefix = "ci".to_string();
        config.spec.rotation.delete_keys_days_old = 30.0;
        config
    }

    fn args(sas: &str) -> RotateArgs {
        RotateArgs {
            service_accounts: sas.to_string(),
            prefix: None,
            project: None,
            days: None,
        }
    }

    #[test]
    fn test_defaults_come_from_config() {
        let request = args("a@p.iam.gserviceaccount.com").to_request(&config()).unwrap();
        assert_eq!(request.secret_manager_project_id, "vault");
        assert_eq!(request.secret_name_prefix.as_str(), "ci");
        assert_eq!(request.delete_keys_days_old, 30.0);
    }

    #[test]
    fn test_flags_override_config() {
        let mut a = args("a@p.iam.gserviceaccount.com");
        a.project = Some("other".to_string());
        a.days = Some(0.0);
        let request = a.to_request(&config()).unwrap();
        assert_eq!(request.secret_manager_project_id, "other");
        assert_eq!(request.delete_keys_days_old, 0.0);
    }

    #[test]
    fn test_missing_project_is_an_error() {
        let mut config = config();
        config.spec.gcp.project_id = None;
        assert!(args("a@p.iam.gserviceaccount.com").to_request(&config).is_err());
    }
}
