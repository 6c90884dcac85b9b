// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Error Taxonomy
//!
//! Two layers of errors:
//!
//! - [`UpstreamError`] is what every port (`IdentityService`, `SecretStore`,
//!   `TokenSource`) returns. It carries the HTTP status the remote API
//!   reported, or 500 when the call never produced one.
//! - [`KeyOpsError`] is what the application services return. Every variant
//!   maps onto exactly one HTTP status via [`KeyOpsError::status_code`].
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Shared error vocabulary for ports, pipelines and the HTTP API

use serde::Serialize;

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_INTERNAL: u16 = 500;

/// Failure reported by (or while talking to) an external service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("upstream returned {status}: {message}")]
pub struct UpstreamError {
    /// HTTP status reported by the upstream API, 500 when unknown.
    pub status: u16,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(STATUS_NOT_FOUND, message)
    }

    /// Transport-level failure: no status was ever received.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(STATUS_INTERNAL, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == STATUS_NOT_FOUND
    }
}

/// Errors surfaced by the key rotation and audit services.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyOpsError {
    /// Malformed input. Raised before any external call is attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(UpstreamError),

    /// The compensating key deletion after a failed publish failed too;
    /// an orphaned key may exist.
    #[error("{original}; compensating delete of {key_name} also failed: {compensation}")]
    CompensationFailure {
        key_name: String,
        original: UpstreamError,
        compensation: UpstreamError,
    },
}

impl KeyOpsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            KeyOpsError::Validation(_) => STATUS_BAD_REQUEST,
            KeyOpsError::NotFound(_) => STATUS_NOT_FOUND,
            KeyOpsError::Upstream(e) => failure_status(e.status),
            KeyOpsError::CompensationFailure { original, .. } => failure_status(original.status),
        }
    }
}

/// An upstream status usable for a failure: 4xx/5xx pass through, anything else is 500.
fn failure_status(status: u16) -> u16 {
    if status >= STATUS_BAD_REQUEST {
        status
    } else {
        STATUS_INTERNAL
    }
}

impl From<UpstreamError> for KeyOpsError {
    fn from(err: UpstreamError) -> Self {
        if err.is_not_found() {
            KeyOpsError::NotFound(err.message)
        } else {
            KeyOpsError::Upstream(err)
        }
    }
}
