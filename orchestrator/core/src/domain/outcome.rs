// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Batch Outcomes
//!
//! Per-unit results produced by one coordinator or auditor pass and the
//! rules for reducing them to a single status:
//!
//! - the aggregate is 200 only when every unit succeeded,
//! - otherwise it is the highest failure code observed.
//!
//! Results are created during one pass, serialized into the response and
//! dropped. None of these types can hold key material.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Result types and aggregation shared by the pipelines

use serde::Serialize;

use crate::domain::error::{KeyOpsError, STATUS_OK};
use crate::domain::key::CreatedKey;

/// Highest of `codes`, or 200 when there are none.
pub fn worst_status<I>(codes: I) -> u16
where
    I: IntoIterator<Item = u16>,
{
    codes.into_iter().fold(STATUS_OK, u16::max)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSummary {
    FullSuccess,
    PartialSuccess,
    TotalFailure,
}

impl BatchSummary {
    pub fn classify(succeeded: usize, total: usize) -> Self {
        if succeeded == total {
            BatchSummary::FullSuccess
        } else if succeeded > 0 {
            BatchSummary::PartialSuccess
        } else {
            BatchSummary::TotalFailure
        }
    }
}

/// What one principal's generate → publish → reap pipeline produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotatedKey {
    #[serde(flatten)]
    pub key: CreatedKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_secret: Option<String>,
    pub added_secret_version: String,
    /// Old keys removed by the reaping stage; absent when reaping was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Vec<String>>,
}

/// Record of the compensating delete issued after a failed publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compensation {
    pub key_name: String,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationFailure {
    pub error: String,
    /// Key metadata when a key was generated before the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<CreatedKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compensation: Option<Compensation>,
    /// Work that completed before a reaping failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<RotatedKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RotationPayload {
    Rotated(RotatedKey),
    Failed(RotationFailure),
}

/// One principal's entry in a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrincipalOutcome {
    pub service_account: String,
    pub code: u16,
    pub result: RotationPayload,
}

impl PrincipalOutcome {
    pub fn rotated(service_account: impl Into<String>, rotated: RotatedKey) -> Self {
        Self {
            service_account: service_account.into(),
            code: STATUS_OK,
            result: RotationPayload::Rotated(rotated),
        }
    }

    pub fn failed(service_account: impl Into<String>, error: &KeyOpsError) -> Self {
        Self::failed_with(
            service_account,
            error,
            RotationFailure {
                error: error.to_string(),
                created: None,
                compensation: None,
                partial: None,
            },
        )
    }

    pub fn failed_with(
        service_account: impl Into<String>,
        error: &KeyOpsError,
        failure: RotationFailure,
    ) -> Self {
        Self {
            service_account: service_account.into(),
            code: error.status_code(),
            result: RotationPayload::Failed(failure),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.result, RotationPayload::Rotated(_))
    }
}

/// Aggregate of one coordinator pass, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub status: u16,
    pub summary: BatchSummary,
    pub results: Vec<PrincipalOutcome>,
}

impl BatchReport {
    pub fn from_outcomes(results: Vec<PrincipalOutcome>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let status = worst_status(results.iter().filter(|r| !r.is_success()).map(|r| r.code));
        Self {
            status,
            summary: BatchSummary::classify(succeeded, results.len()),
            results,
        }
    }
}

/// Log severity attached to an audit finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Notice,
    Warning,
}

/// Classification of one audited secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditFinding {
    /// Latest payload is not a credentials file.
    Unparsable { secret: String, reason: String },
    /// The account named in the payload cannot be found upstream.
    PrincipalMissing {
        secret: String,
        service_account: String,
        reason: String,
    },
    /// The payload's key id is one of the account's live keys.
    Healthy {
        secret: String,
        service_account: String,
        private_key_id: String,
    },
    /// The payload's key id is not among the account's live keys.
    StaleKey {
        secret: String,
        service_account: String,
        private_key_id: String,
    },
}

impl AuditFinding {
    pub fn severity(&self) -> Severity {
        match self {
            AuditFinding::Healthy { .. } => Severity::Notice,
            _ => Severity::Warning,
        }
    }

    pub fn message(&self) -> String {
        match self {
            AuditFinding::Unparsable { secret, reason } => format!(
                "Failed to parse service account JSON key in secret {} payload: {}",
                secret, reason
            ),
            AuditFinding::PrincipalMissing {
                secret,
                service_account,
                reason,
            } => format!(
                "Secret {} has a service account {} that does not exist: {}; recommend to delete the secret",
                secret, service_account, reason
            ),
            AuditFinding::Healthy {
                secret,
                service_account,
                ..
            } => format!(
                "Service account key in secret {} exists for {}",
                secret, service_account
            ),
            AuditFinding::StaleKey {
                secret,
                service_account,
                ..
            } => format!(
                "Secret {} has invalid service account key for {}; valid keys may exist in older versions",
                secret, service_account
            ),
        }
    }
}

/// One secret's entry in an [`AuditReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretAudit {
    /// Unique per audit task so duplicated secret ids stay distinct.
    pub op: String,
    pub secret_id: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finding: Option<AuditFinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SecretAudit {
    pub fn found(op: String, secret_id: String, finding: AuditFinding) -> Self {
        Self {
            op,
            secret_id,
            code: STATUS_OK,
            severity: Some(finding.severity()),
            message: Some(finding.message()),
            finding: Some(finding),
            error: None,
        }
    }

    pub fn errored(op: String, secret_id: String, error: &KeyOpsError) -> Self {
        Self {
            op,
            secret_id,
            code: error.status_code(),
            severity: None,
            message: None,
            finding: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub status: u16,
    pub results: Vec<SecretAudit>,
}

impl AuditReport {
    pub fn from_audits(results: Vec<SecretAudit>) -> Self {
        Self {
            status: worst_status(results.iter().map(|r| r.code)),
            results,
        }
    }
}
