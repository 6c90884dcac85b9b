// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the sa-keys CLI

pub mod audit;
pub mod config;
pub mod keys;
pub mod rotate;
pub mod serve;

pub use self::audit::AuditArgs;
pub use self::config::ConfigCommand;
pub use self::keys::KeysCommand;
pub use self::rotate::RotateArgs;
pub use self::serve::ServeArgs;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sa_keys_core::domain::config::SaKeysConfig;
use sa_keys_core::domain::identity::IdentityService;
use sa_keys_core::domain::secret_store::SecretStore;
use sa_keys_core::infrastructure::gcp::token_source_from_config;
use sa_keys_core::infrastructure::{
    IamRestClient, InMemoryIdentityService, InMemorySecretStore, SecretManagerRestClient,
};

/// The two upstream ports, built once and shared by every service.
pub struct Ports {
    pub identity: Arc<dyn IdentityService>,
    pub store: Arc<dyn SecretStore>,
}

impl Ports {
    /// REST adapters authenticated per `spec.gcp.credentials`.
    pub fn google(config: &SaKeysConfig) -> Result<Self> {
        let gcp = &config.spec.gcp;
        let timeout = Duration::from_secs(gcp.request_timeout_seconds);
        let tokens =
            token_source_from_config(gcp).context("Failed to initialize Google credentials")?;

        let identity = IamRestClient::new(gcp.iam_endpoint.clone(), tokens.clone(), timeout)
            .context("Failed to build IAM client")?;
        let store = SecretManagerRestClient::new(gcp.secret_manager_endpoint.clone(), tokens, timeout)
            .context("Failed to build Secret Manager client")?;

        Ok(Self {
            identity: Arc::new(identity),
            store: Arc::new(store),
        })
    }

    /// Process-local adapters; every well-formed service account exists.
    pub fn in_memory() -> Self {
        Self {
            identity: Arc::new(InMemoryIdentityService::with_auto_accounts()),
            store: Arc::new(InMemorySecretStore::new()),
        }
    }
}

/// Load, override and validate configuration for commands that talk to Google.
pub(crate) fn load_config(config_path: Option<PathBuf>) -> Result<SaKeysConfig> {
    let config =
        SaKeysConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;
    Ok(config)
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Colored one-line status for a batch result.
pub(crate) fn print_status(label: &str, status: u16) {
    let line = format!("{} finished with status {}", label, status);
    if status == 200 {
        eprintln!("{}", format!("✓ {}", line).green());
    } else {
        eprintln!("{}", format!("✗ {}", line).red());
    }
}
