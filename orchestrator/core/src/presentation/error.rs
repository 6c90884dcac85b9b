// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error mapping from [`KeyOpsError`] to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::error::KeyOpsError;

/// `code` as a status, falling back to 500 for values outside 100..=999.
pub(crate) fn status_from_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn log_error(e: &KeyOpsError) {
    match e {
        KeyOpsError::Validation(msg) => tracing::debug!(%msg, "Rejected request"),
        KeyOpsError::NotFound(msg) => tracing::debug!(%msg, "Resource not found"),
        KeyOpsError::Upstream(err) if err.status >= 500 => {
            tracing::error!(status = err.status, error = %err.message, "Upstream failure")
        }
        KeyOpsError::Upstream(err) => {
            tracing::warn!(status = err.status, error = %err.message, "Upstream rejected request")
        }
        KeyOpsError::CompensationFailure { key_name, .. } => {
            tracing::error!(%key_name, error = %e, "Compensation failed")
        }
    }
}

impl IntoResponse for KeyOpsError {
    fn into_response(self) -> Response {
        log_error(&self);
        let code = self.status_code();
        (
            status_from_code(code),
            Json(json!({
                "code": code,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::UpstreamError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            KeyOpsError::validation("bad").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            KeyOpsError::from(UpstreamError::new(429, "quota"))
                .into_response()
                .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(status_from_code(42), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
