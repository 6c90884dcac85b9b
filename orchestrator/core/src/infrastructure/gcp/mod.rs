// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Google Cloud REST Adapters
//!
//! Anti-Corruption Layer between the domain ports and the Google REST APIs.
//!
//! # Error mapping
//!
//! Google reports failures as
//! `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`.
//! Every adapter turns that into an [`UpstreamError`] carrying the HTTP
//! status and message. Failures that never produced a response (DNS,
//! connection reset, timeout) become status 500.

pub mod auth;
pub mod iam;
pub mod secret_manager;

use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::error::UpstreamError;

pub use auth::{token_source_from_config, TokenSource};
pub use iam::IamRestClient;
pub use secret_manager::SecretManagerRestClient;

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Convert a non-success response into an [`UpstreamError`].
pub(crate) async fn error_from_response(response: Response) -> UpstreamError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<GoogleErrorBody>(&body) {
        Ok(parsed) => match (parsed.error.status, parsed.error.message) {
            (Some(kind), Some(message)) => format!("{}: {}", kind, message),
            (None, Some(message)) => message,
            (Some(kind), None) => kind,
            (None, None) => format!("HTTP {}", status),
        },
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => body,
    };
    UpstreamError::new(status.as_u16(), message)
}

pub(crate) fn transport_error(context: &str, error: reqwest::Error) -> UpstreamError {
    UpstreamError::transport(format!("{}: {}", context, error))
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, UpstreamError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| UpstreamError::transport(format!("Failed to create HTTP client: {}", e)))
}
