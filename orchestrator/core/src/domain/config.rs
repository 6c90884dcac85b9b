// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Service Configuration Types
//
// Defines the configuration schema for the sa-keys service:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Google Cloud endpoints, default project and credential source
// - Worker pool sizing
// - Rotation defaults and the optional finding trigger policy
// - Network and observability settings

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "sa-keys/v1";
pub const KIND: &str = "SaKeysConfig";
pub const DEFAULT_MAX_WORKERS: usize = 20;

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaKeysConfig {
    /// API version (must be "sa-keys/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SaKeysConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: SaKeysSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

/// Configuration specification (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaKeysSpec {
    #[serde(default)]
    pub gcp: GcpConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub rotation: RotationDefaults,

    /// Security Command Center finding trigger. Absent means disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<TriggerPolicy>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    /// Default Secret Manager project. Required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default = "default_iam_endpoint")]
    pub iam_endpoint: String,

    #[serde(default = "default_secret_manager_endpoint")]
    pub secret_manager_endpoint: String,

    /// Per-request timeout applied by the HTTP client
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(default)]
    pub credentials: CredentialsSource,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            iam_endpoint: default_iam_endpoint(),
            secret_manager_endpoint: default_secret_manager_endpoint(),
            request_timeout_seconds: default_request_timeout(),
            credentials: CredentialsSource::default(),
        }
    }
}

/// Where OAuth access tokens come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum CredentialsSource {
    /// GOOGLE_APPLICATION_CREDENTIALS, then GCP_ACCESS_TOKEN, then the metadata server
    #[default]
    Auto,
    /// GCE / Cloud Run metadata server
    Metadata,
    /// Service account JSON key file
    ServiceAccountFile { path: PathBuf },
    /// Fixed bearer token (supports "env:VAR_NAME")
    StaticToken { token: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum concurrent per-principal / per-secret tasks
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

/// Defaults used when a rotation request leaves a field out
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationDefaults {
    #[serde(default)]
    pub secret_name_prefix: String,

    /// 0 disables reaping
    #[serde(default)]
    pub delete_keys_days_old: f64,
}

/// Which findings may trigger a rotation, and how to rotate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_regex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id_regex: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_manager_project_id: Option<String>,

    #[serde(default)]
    pub secret_name_prefix: String,

    #[serde(default)]
    pub delete_keys_days_old: f64,
}

impl TriggerPolicy {
    /// Required fields that are absent or empty, by config path.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.service_account_regex) {
            missing.push("spec.trigger.service_account_regex");
        }
        if is_blank(&self.project_id_regex) {
            missing.push("spec.trigger.project_id_regex");
        }
        if is_blank(&self.secret_manager_project_id) {
            missing.push("spec.trigger.secret_manager_project_id");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network bind address (e.g. "0.0.0.0" or "127.0.0.1")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP API port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus exposition
    #[serde(default)]
    pub enabled: bool,

    /// Metrics endpoint port
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

// Default value functions
fn default_iam_endpoint() -> String {
    "https://iam.googleapis.com/v1".to_string()
}

fn default_secret_manager_endpoint() -> String {
    "https://secretmanager.googleapis.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

impl Default for SaKeysConfig {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "sa-keys".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: SaKeysSpec::default(),
        }
    }
}

impl SaKeysConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. SA_KEYS_CONFIG_PATH environment variable
    /// 2. ./sa-keys-config.yaml (working directory)
    /// 3. ~/.sa-keys/config.yaml (user home)
    /// 4. /etc/sa-keys/config.yaml (system, Unix)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SA_KEYS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./sa-keys-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".sa-keys").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        {
            let system_config = PathBuf::from("/etc/sa-keys/config.yaml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    /// This allows container deployments to override config via env vars
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project) = lookup("GCP_PROJECT").filter(|v| !v.trim().is_empty()) {
            tracing::info!("Environment override: GCP_PROJECT={}", project);
            self.spec.gcp.project_id = Some(project);
        }

        // MAX_THREADS is the historical name; SA_KEYS_MAX_WORKERS wins when both are set.
        for key in ["MAX_THREADS", "SA_KEYS_MAX_WORKERS"] {
            if let Some(val) = lookup(key) {
                match val.trim().parse::<usize>() {
                    Ok(n) => {
                        tracing::info!("Environment override: {}={}", key, n);
                        self.spec.workers.max_workers = n;
                    }
                    Err(_) => {
                        tracing::warn!(
                            "Invalid value for {}: '{}'. Expected a positive integer. Ignoring.",
                            key,
                            val
                        );
                    }
                }
            }
        }

        if let Some(val) = lookup("PORT") {
            match val.trim().parse::<u16>() {
                Ok(port) => {
                    tracing::info!("Environment override: PORT={}", port);
                    self.spec.network.port = port;
                }
                Err(_) => {
                    tracing::warn!("Invalid value for PORT: '{}'. Ignoring.", val);
                }
            }
        }

        if let Some(format) = lookup("SA_KEYS_LOG_FORMAT") {
            self.spec.observability.logging.format = format;
        }
    }

    /// Default Secret Manager project, if configured.
    pub fn project_id(&self) -> Option<&str> {
        self.spec
            .gcp
            .project_id
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }

    /// Required fields that are absent or empty, by config path.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.metadata.name.trim().is_empty() {
            missing.push("metadata.name");
        }
        if self.project_id().is_none() {
            missing.push("spec.gcp.project_id");
        }
        if let Some(trigger) = &self.spec.trigger {
            missing.extend(trigger.missing_fields());
        }
        missing
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        let missing = self.missing_fields();
        if !missing.is_empty() {
            anyhow::bail!("Missing required configuration fields: {}", missing.join(", "));
        }

        if self.spec.workers.max_workers == 0 {
            anyhow::bail!("spec.workers.max_workers must be at least 1");
        }

        if self.spec.gcp.request_timeout_seconds == 0 {
            anyhow::bail!("spec.gcp.request_timeout_seconds must be at least 1");
        }

        check_days("spec.rotation.delete_keys_days_old", self.spec.rotation.delete_keys_days_old)?;

        if !self.spec.rotation.secret_name_prefix.is_empty() {
            crate::domain::principal::SecretNamePrefix::parse(&self.spec.rotation.secret_name_prefix)
                .map_err(|e| anyhow::anyhow!("spec.rotation.secret_name_prefix: {}", e))?;
        }

        if let Some(trigger) = &self.spec.trigger {
            for (field, pattern) in [
                ("spec.trigger.service_account_regex", &trigger.service_account_regex),
                ("spec.trigger.project_id_regex", &trigger.project_id_regex),
            ] {
                if let Some(pattern) = pattern {
                    Regex::new(pattern)
                        .map_err(|e| anyhow::anyhow!("{} is not a valid regex: {}", field, e))?;
                }
            }
            check_days("spec.trigger.delete_keys_days_old", trigger.delete_keys_days_old)?;
        }

        if !matches!(self.spec.observability.logging.format.as_str(), "json" | "text") {
            anyhow::bail!(
                "Invalid logging format: '{}'. Must be 'json' or 'text'",
                self.spec.observability.logging.format
            );
        }

        Ok(())
    }
}

fn check_days(field: &str, days: f64) -> anyhow::Result<()> {
    if !days.is_finite() || days < 0.0 {
        anyhow::bail!("{} must be a non-negative number of days", field);
    }
    Ok(())
}

/// Resolve "env:VAR_NAME" indirections used by secret-bearing fields.
pub fn resolve_env_reference(value: &str) -> anyhow::Result<String> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var)
            .map_err(|_| anyhow::anyhow!("Environment variable {} is not set", var)),
        None => Ok(value.to_string()),
    }
}
