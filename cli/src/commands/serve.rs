// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP service
//!
//! Builds the upstream clients once, wires them into the router and serves
//! until Ctrl+C or SIGTERM. In-flight requests finish before exit.

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use sa_keys_core::domain::config::{MetricsConfig, SaKeysConfig};
use sa_keys_core::presentation::api::{router, AppState};

use super::Ports;

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Use process-local IAM and Secret Manager fakes instead of Google APIs
    #[arg(long)]
    pub in_memory: bool,
}

pub async fn run(
    args: ServeArgs,
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config =
        SaKeysConfig::load_or_default(config_path).context("Failed to load configuration")?;
    if let Some(host) = host {
        config.spec.network.bind_address = host;
    }
    if let Some(port) = port {
        config.spec.network.port = port;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        name = %config.metadata.name,
        project = config.project_id().unwrap_or_default(),
        max_workers = config.spec.workers.max_workers,
        trigger = config.spec.trigger.is_some(),
        "Configuration loaded"
    );

    if config.spec.observability.metrics.enabled {
        install_metrics_exporter(&config.spec.observability.metrics)?;
    }

    let ports = if args.in_memory {
        warn!("Serving with in-memory adapters; nothing reaches Google Cloud");
        Ports::in_memory()
    } else {
        Ports::google(&config)?
    };

    let addr = format!(
        "{}:{}",
        config.spec.network.bind_address, config.spec.network.port
    );
    let state = AppState::new(config, ports.identity, ports.store)
        .context("Failed to initialize services")?;
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("sa-keys listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("sa-keys shutting down");

    Ok(())
}

fn install_metrics_exporter(metrics: &MetricsConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], metrics.port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics on {}/metrics", addr);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
