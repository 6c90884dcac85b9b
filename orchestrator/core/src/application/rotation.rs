// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Batch Coordinator
//!
//! Rotates the keys of many service accounts at once. For each principal,
//! on the bounded worker pool:
//!
//! ```text
//! generate ──► publish ──► reap (only when days > 0)
//!                 │
//!                 └─ failure ──► delete the new key once (compensation)
//! ```
//!
//! The whole request is validated before the first task is submitted, so a
//! malformed principal never causes an external call. Every principal gets
//! exactly one entry in the [`BatchReport`], in completion order.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates generator, publisher and reaper per principal

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::key_generator::{GeneratedKey, KeyGenerator};
use crate::application::key_reaper::KeyReaper;
use crate::application::pool::WorkerPool;
use crate::application::secret_publisher::SecretPublisher;
use crate::domain::error::{KeyOpsError, UpstreamError, STATUS_INTERNAL};
use crate::domain::identity::IdentityService;
use crate::domain::key::validate_age_days;
use crate::domain::outcome::{
    BatchReport, BatchSummary, Compensation, PrincipalOutcome, RotatedKey, RotationFailure,
};
use crate::domain::principal::{parse_service_accounts, SecretNamePrefix, ServiceAccount};
use crate::domain::secret_store::SecretStore;

/// A validated rotation batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RotationRequest {
    pub service_accounts: Vec<ServiceAccount>,
    pub secret_name_prefix: SecretNamePrefix,
    pub secret_manager_project_id: String,
    /// Keys older than this are deleted after a successful publish; 0 disables reaping.
    pub delete_keys_days_old: f64,
}

impl RotationRequest {
    /// Validate raw request fields. Any malformed entry rejects the whole batch.
    pub fn parse(
        service_accounts: &str,
        secret_name_prefix: Option<&str>,
        secret_manager_project_id: &str,
        delete_keys_days_old: f64,
    ) -> Result<Self, KeyOpsError> {
        let service_accounts = parse_service_accounts(service_accounts)?;
        let secret_name_prefix = SecretNamePrefix::parse(secret_name_prefix.unwrap_or_default())?;

        let project = secret_manager_project_id.trim();
        if project.is_empty() {
            return Err(KeyOpsError::validation("secret_manager_project_id is required"));
        }
        if !project
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(KeyOpsError::validation(format!(
                "secret_manager_project_id '{}' is not a valid project id",
                project
            )));
        }

        Ok(Self {
            service_accounts,
            secret_name_prefix,
            secret_manager_project_id: project.to_string(),
            delete_keys_days_old: validate_age_days(delete_keys_days_old)?,
        })
    }
}

/// Per-batch settings shared by every task of one [`BatchCoordinator::rotate`] call.
struct BatchSettings {
    secret_name_prefix: SecretNamePrefix,
    secret_manager_project_id: String,
    delete_keys_days_old: f64,
}

#[derive(Clone)]
pub struct BatchCoordinator {
    identity: Arc<dyn IdentityService>,
    generator: Arc<KeyGenerator>,
    publisher: Arc<SecretPublisher>,
    reaper: Arc<KeyReaper>,
    pool: WorkerPool,
}

impl BatchCoordinator {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn SecretStore>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            generator: Arc::new(KeyGenerator::new(identity.clone())),
            publisher: Arc::new(SecretPublisher::new(store)),
            reaper: Arc::new(KeyReaper::new(identity.clone())),
            identity,
            pool,
        }
    }

    pub async fn rotate(&self, request: RotationRequest) -> BatchReport {
        let settings = Arc::new(BatchSettings {
            secret_name_prefix: request.secret_name_prefix,
            secret_manager_project_id: request.secret_manager_project_id,
            delete_keys_days_old: request.delete_keys_days_old,
        });
        let total = request.service_accounts.len();

        let this = self.clone();
        let completed = self
            .pool
            .run(request.service_accounts, move |sa| {
                let this = this.clone();
                let settings = Arc::clone(&settings);
                async move { this.rotate_principal(&sa, &settings).await }
            })
            .await;

        let outcomes = completed
            .into_iter()
            .map(|done| match done.outcome {
                Ok(outcome) => outcome,
                Err(panicked) => {
                    error!(service_account = %done.item, error = %panicked, "rotation task panicked");
                    PrincipalOutcome::failed(
                        done.item.email(),
                        &KeyOpsError::Upstream(UpstreamError::new(
                            STATUS_INTERNAL,
                            panicked.to_string(),
                        )),
                    )
                }
            })
            .collect();

        let report = BatchReport::from_outcomes(outcomes);
        let succeeded = report.results.iter().filter(|r| r.is_success()).count();
        match report.summary {
            BatchSummary::FullSuccess => info!(
                target: "sa_keys::audit",
                total,
                "all service account keys rotated"
            ),
            BatchSummary::PartialSuccess => warn!(
                target: "sa_keys::audit",
                total,
                succeeded,
                status = report.status,
                "some service account key rotations failed"
            ),
            BatchSummary::TotalFailure => error!(
                target: "sa_keys::audit",
                total,
                status = report.status,
                "every service account key rotation failed"
            ),
        }
        report
    }

    async fn rotate_principal(&self, sa: &ServiceAccount, settings: &BatchSettings) -> PrincipalOutcome {
        let GeneratedKey {
            name,
            created,
            material,
        } = match self.generator.generate(sa).await {
            Ok(generated) => generated,
            Err(err) => {
                warn!(service_account = %sa, error = %err, "key generation failed");
                return PrincipalOutcome::failed(sa.email(), &err);
            }
        };

        let secret_id = settings.secret_name_prefix.secret_id_for(sa);
        let published = match self
            .publisher
            .publish(&settings.secret_manager_project_id, &secret_id, material)
            .await
        {
            Ok(published) => published,
            Err(original) => {
                warn!(
                    service_account = %sa,
                    key = %name,
                    status = original.status,
                    error = %original.message,
                    "secret publish failed, deleting new key"
                );
                let (err, compensation) = self.compensate(sa, &created.private_key_id, original).await;
                return PrincipalOutcome::failed_with(
                    sa.email(),
                    &err,
                    RotationFailure {
                        error: err.to_string(),
                        created: Some(created),
                        compensation: Some(compensation),
                        partial: None,
                    },
                );
            }
        };

        let mut rotated = RotatedKey {
            key: created,
            found_secret: published.found_secret,
            created_secret: published.created_secret,
            added_secret_version: published.added_secret_version,
            deleted: None,
        };

        if settings.delete_keys_days_old > 0.0 {
            match self
                .reaper
                .delete_keys_older_than(sa, settings.delete_keys_days_old)
                .await
            {
                Ok(report) => {
                    let failed = report.failed;
                    rotated.deleted = Some(report.deleted);
                    if let Some(failed) = failed {
                        let err = KeyOpsError::Upstream(failed.error);
                        warn!(service_account = %sa, key = %failed.name, error = %err, "old key cleanup stopped early");
                        return reaping_failed(sa, &err, rotated);
                    }
                }
                Err(err) => {
                    warn!(service_account = %sa, error = %err, "old key cleanup failed");
                    rotated.deleted = Some(Vec::new());
                    return reaping_failed(sa, &err, rotated);
                }
            }
        }

        info!(service_account = %sa, key = %name, "rotated service account key");
        PrincipalOutcome::rotated(sa.email(), rotated)
    }

    /// Delete the key minted for a failed publish. Issued exactly once.
    async fn compensate(
        &self,
        sa: &ServiceAccount,
        private_key_id: &str,
        original: UpstreamError,
    ) -> (KeyOpsError, Compensation) {
        let key_name = sa.key_resource_name(private_key_id);
        metrics::counter!("sa_keys_compensations_total").increment(1);

        match self.identity.delete_key(&key_name).await {
            Ok(()) => {
                info!(key = %key_name, "deleted unpublished key");
                let compensation = Compensation {
                    key_name,
                    deleted: true,
                    error: None,
                };
                (KeyOpsError::from(original), compensation)
            }
            Err(compensation_err) => {
                error!(
                    target: "sa_keys::audit",
                    key = %key_name,
                    error = %compensation_err,
                    "failed to delete unpublished key, it may be orphaned"
                );
                let compensation = Compensation {
                    key_name: key_name.clone(),
                    deleted: false,
                    error: Some(compensation_err.to_string()),
                };
                let err = KeyOpsError::CompensationFailure {
                    key_name,
                    original,
                    compensation: compensation_err,
                };
                (err, compensation)
            }
        }
    }
}

fn reaping_failed(sa: &ServiceAccount, err: &KeyOpsError, partial: RotatedKey) -> PrincipalOutcome {
    PrincipalOutcome::failed_with(
        sa.email(),
        err,
        RotationFailure {
            error: err.to_string(),
            created: None,
            compensation: None,
            partial: Some(partial),
        },
    )
}
