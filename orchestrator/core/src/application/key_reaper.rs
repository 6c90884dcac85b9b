// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Key Reaper
//!
//! Lists a service account's keys, selects the user-managed ones older than
//! a threshold and deletes keys by resource name.
//!
//! Deletion is sequential and non-transactional: the first failure stops
//! the run, keys already deleted stay deleted and the rest are reported as
//! not attempted.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Old key cleanup for the batch coordinator and the key endpoints

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::error::{KeyOpsError, UpstreamError, STATUS_OK};
use crate::domain::identity::IdentityService;
use crate::domain::key::KeyRecord;
use crate::domain::principal::{KeyResourceName, ServiceAccount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDeletion {
    pub name: String,
    pub error: UpstreamError,
}

/// Outcome of one [`KeyReaper::delete_keys`] run, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    pub deleted: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<FailedDeletion>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_attempted: Vec<String>,
}

impl DeletionReport {
    /// 200, or the status of the deletion that stopped the run.
    pub fn status(&self) -> u16 {
        match &self.failed {
            Some(f) => KeyOpsError::Upstream(f.error.clone()).status_code(),
            None => STATUS_OK,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

pub struct KeyReaper {
    identity: Arc<dyn IdentityService>,
}

impl KeyReaper {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self { identity }
    }

    pub async fn list_keys(&self, sa: &ServiceAccount) -> Result<Vec<KeyRecord>, UpstreamError> {
        self.identity.list_keys(sa).await
    }

    /// User-managed keys of `sa` that became valid more than `days` ago.
    /// System-managed keys are never returned. An empty list is not an error.
    pub async fn keys_older_than(
        &self,
        sa: &ServiceAccount,
        days: f64,
    ) -> Result<Vec<KeyRecord>, UpstreamError> {
        let now = Utc::now();
        let keys = self.identity.list_keys(sa).await?;
        Ok(keys
            .into_iter()
            .filter(|k| k.is_user_managed() && k.is_older_than(days, now))
            .collect())
    }

    /// Delete `names` in order. Every name is validated before the first
    /// delete is issued.
    pub async fn delete_keys(&self, names: &[String]) -> Result<DeletionReport, KeyOpsError> {
        let names = names
            .iter()
            .map(|n| KeyResourceName::parse(n))
            .collect::<Result<Vec<_>, _>>()?;

        if names.is_empty() {
            warn!("no keys to delete");
            return Ok(DeletionReport::default());
        }

        let mut report = DeletionReport::default();
        let mut remaining = names.into_iter();
        for name in remaining.by_ref() {
            match self.identity.delete_key(name.as_str()).await {
                Ok(()) => {
                    info!(key = %name, "deleted service account key");
                    metrics::counter!("sa_keys_keys_deleted_total").increment(1);
                    report.deleted.push(name.into());
                }
                Err(error) => {
                    warn!(key = %name, status = error.status, error = %error.message, "key deletion failed");
                    report.failed = Some(FailedDeletion {
                        name: name.into(),
                        error,
                    });
                    break;
                }
            }
        }
        report.not_attempted = remaining.map(String::from).collect();
        Ok(report)
    }

    pub async fn delete_keys_older_than(
        &self,
        sa: &ServiceAccount,
        days: f64,
    ) -> Result<DeletionReport, KeyOpsError> {
        let old: Vec<String> = self
            .keys_older_than(sa, days)
            .await?
            .into_iter()
            .map(|k| k.name)
            .collect();
        self.delete_keys(&old).await
    }
}
