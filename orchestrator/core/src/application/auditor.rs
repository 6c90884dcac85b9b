// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Secret Auditor
//!
//! Checks that the key stored in a secret's latest version is still one of
//! its service account's live keys. Each secret is classified as one of
//! [`AuditFinding`]'s variants and logged at the finding's severity under
//! the `sa_keys::audit` target.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Read-only consistency audit between secrets and keys

use regex::Regex;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::key_reaper::KeyReaper;
use crate::application::pool::WorkerPool;
use crate::domain::error::{KeyOpsError, UpstreamError, STATUS_INTERNAL};
use crate::domain::identity::IdentityService;
use crate::domain::key::{CreatedKey, KeyMaterial};
use crate::domain::outcome::{AuditFinding, AuditReport, SecretAudit, Severity};
use crate::domain::principal::ServiceAccount;
use crate::domain::secret::{secret_path, secret_version_path};
use crate::domain::secret_store::SecretStore;

#[derive(Clone)]
pub struct SecretAuditor {
    store: Arc<dyn SecretStore>,
    reaper: Arc<KeyReaper>,
    pool: WorkerPool,
}

impl SecretAuditor {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn SecretStore>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            store,
            reaper: Arc::new(KeyReaper::new(identity)),
            pool,
        }
    }

    /// Audit every secret of `project` whose id matches `secret_regex`
    /// anywhere (unanchored search).
    pub async fn audit_project(
        &self,
        project: &str,
        secret_regex: &str,
    ) -> Result<AuditReport, KeyOpsError> {
        let re = Regex::new(secret_regex).map_err(|e| {
            KeyOpsError::validation(format!("invalid secret regex '{}': {}", secret_regex, e))
        })?;

        let secret_ids: Vec<String> = self
            .store
            .list_secrets(project)
            .await?
            .iter()
            .map(|s| s.secret_id())
            .filter(|id| re.is_match(id))
            .map(str::to_string)
            .collect();

        info!(project, matched = secret_ids.len(), regex = secret_regex, "auditing secrets");
        Ok(self.audit_batch(project, secret_ids).await)
    }

    /// One audit task per secret id on the worker pool. Per-secret errors are
    /// recorded in that secret's entry.
    pub async fn audit_batch(&self, project: &str, secret_ids: Vec<String>) -> AuditReport {
        let this = self.clone();
        let project_owned = project.to_string();
        let completed = self
            .pool
            .run(secret_ids, move |secret_id| {
                let this = this.clone();
                let project = project_owned.clone();
                async move {
                    let op = op_name(&project, &secret_id);
                    match this.audit_secret(&project, &secret_id).await {
                        Ok(finding) => {
                            log_finding(&op, &finding);
                            SecretAudit::found(op, secret_id, finding)
                        }
                        Err(err) => {
                            warn!(target: "sa_keys::audit", op = %op, error = %err, "secret audit failed");
                            SecretAudit::errored(op, secret_id, &err)
                        }
                    }
                }
            })
            .await;

        let results = completed
            .into_iter()
            .map(|done| match done.outcome {
                Ok(audit) => audit,
                Err(panicked) => SecretAudit::errored(
                    op_name(project, &done.item),
                    done.item,
                    &KeyOpsError::Upstream(UpstreamError::new(STATUS_INTERNAL, panicked.to_string())),
                ),
            })
            .collect();

        AuditReport::from_audits(results)
    }

    /// Classify the latest version of one secret. Errors only when the
    /// version itself cannot be read.
    pub async fn audit_secret(
        &self,
        project: &str,
        secret_id: &str,
    ) -> Result<AuditFinding, KeyOpsError> {
        let secret = secret_path(project, secret_id);
        let payload = KeyMaterial::new(
            self.store
                .access_secret_version(&secret_version_path(project, secret_id, "latest"))
                .await?,
        );

        let created = match CreatedKey::from_material(&payload) {
            Ok(created) => created,
            Err(e) => {
                return Ok(AuditFinding::Unparsable {
                    secret,
                    reason: e.to_string(),
                })
            }
        };

        let sa = match ServiceAccount::parse(&created.client_email) {
            Ok(sa) => sa,
            Err(e) => {
                return Ok(AuditFinding::Unparsable {
                    secret,
                    reason: e.to_string(),
                })
            }
        };

        // Every live user-managed key counts, whatever its validAfterTime.
        let keys: Vec<_> = match self.reaper.list_keys(&sa).await {
            Ok(keys) => keys.into_iter().filter(|k| k.is_user_managed()).collect(),
            Err(e) => {
                return Ok(AuditFinding::PrincipalMissing {
                    secret,
                    service_account: sa.to_string(),
                    reason: e.message,
                })
            }
        };

        if keys.iter().any(|k| k.key_id() == created.private_key_id) {
            Ok(AuditFinding::Healthy {
                secret,
                service_account: sa.to_string(),
                private_key_id: created.private_key_id,
            })
        } else {
            Ok(AuditFinding::StaleKey {
                secret,
                service_account: sa.to_string(),
                private_key_id: created.private_key_id,
            })
        }
    }
}

/// Unique id of one audit task.
fn op_name(project: &str, secret_id: &str) -> String {
    format!("{}/ops/{}", secret_path(project, secret_id), Uuid::new_v4())
}

fn log_finding(op: &str, finding: &AuditFinding) {
    let severity = finding.severity();
    let label = match severity {
        Severity::Notice => "notice",
        Severity::Warning => "warning",
    };
    metrics::counter!("sa_keys_audit_findings_total", "severity" => label).increment(1);
    match severity {
        Severity::Notice => info!(target: "sa_keys::audit", op, "{}", finding.message()),
        Severity::Warning => warn!(target: "sa_keys::audit", op, "{}", finding.message()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key::{KeyRecord, KeyType};
    use crate::domain::secret::Replication;
    use crate::infrastructure::in_memory::{InMemoryIdentityService, InMemorySecretStore};
    use base64::Engine;

    fn setup() -> (Arc<InMemoryIdentityService>, Arc<InMemorySecretStore>, SecretAuditor) {
        let identity = Arc::new(InMemoryIdentityService::new());
        let store = Arc::new(InMemorySecretStore::new());
        let auditor = SecretAuditor::new(identity.clone(), store.clone(), WorkerPool::new(3));
        (identity, store, auditor)
    }

    async fn put(store: &InMemorySecretStore, secret_id: &str, payload: &[u8]) {
        store
            .create_secret("vault", secret_id, Replication::default())
            .await
            .unwrap();
        store
            .add_secret_version(&secret_path("vault", secret_id), payload)
            .await
            .unwrap();
    }

    /// Mint a key through the fake and return its decoded credentials file.
    async fn minted(identity: &InMemoryIdentityService, sa: &ServiceAccount) -> Vec<u8> {
        let key = identity.create_key(sa).await.unwrap();
        base64::engine::general_purpose::STANDARD
            .decode(&key.private_key_data)
            .unwrap()
    }

    #[tokio::test]
    async fn test_classifications() {
        let (identity, store, auditor) = setup();
        let live = ServiceAccount::parse("live@proj.iam.gserviceaccount.com").unwrap();
        identity.add_account(&live);

        let healthy = minted(&identity, &live).await;
        put(&store, "healthy", &healthy).await;

        let stale = minted(&identity, &live).await;
        let stale_key = identity.keys_of(&live)[1].name.clone();
        identity.delete_key(&stale_key).await.unwrap();
        put(&store, "stale", &stale).await;

        put(&store, "garbage", b"not json at all").await;

        let gone = ServiceAccount::parse("gone@proj.iam.gserviceaccount.com").unwrap();
        identity.add_account(&gone);
        let orphan = minted(&identity, &gone).await;
        identity.remove_account(&gone);
        put(&store, "orphan", &orphan).await;

        assert!(matches!(
            auditor.audit_secret("vault", "healthy").await.unwrap(),
            AuditFinding::Healthy { .. }
        ));
        assert!(matches!(
            auditor.audit_secret("vault", "stale").await.unwrap(),
            AuditFinding::StaleKey { .. }
        ));
        assert!(matches!(
            auditor.audit_secret("vault", "garbage").await.unwrap(),
            AuditFinding::Unparsable { .. }
        ));
        let missing = auditor.audit_secret("vault", "orphan").await.unwrap();
        assert!(matches!(missing, AuditFinding::PrincipalMissing { .. }));
        assert!(missing.message().contains("recommend to delete the secret"));
    }

    #[tokio::test]
    async fn test_audit_project_filters_and_aggregates() {
        let (_identity, store, auditor) = setup();
        put(&store, "app_one", b"{}").await;
        put(&store, "app_two", b"[]").await;
        put(&store, "other", b"x").await;
        store
            .create_secret("vault", "app_empty", Replication::default())
            .await
            .unwrap();

        let report = auditor.audit_project("vault", "^app_").await.unwrap();
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.status, 404);

        let mut ops: Vec<&str> = report.results.iter().map(|r| r.op.as_str()).collect();
        ops.sort();
        ops.dedup();
        assert_eq!(ops.len(), 3);
        assert!(report
            .results
            .iter()
            .all(|r| r.op.starts_with(&format!("projects/vault/secrets/{}/ops/", r.secret_id))));
    }

    #[tokio::test]
    async fn test_invalid_regex_is_rejected() {
        let (_identity, store, auditor) = setup();
        let err = auditor.audit_project("vault", "(unclosed").await.unwrap_err();
        assert!(matches!(err, KeyOpsError::Validation(_)));
        assert_eq!(store.list_secrets_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_get_distinct_ops() {
        let (_identity, store, auditor) = setup();
        put(&store, "dup", b"nope").await;

        let report = auditor
            .audit_batch("vault", vec!["dup".to_string(), "dup".to_string()])
            .await;
        assert_eq!(report.status, 200);
        assert_ne!(report.results[0].op, report.results[1].op);
    }

    #[tokio::test]
    async fn test_key_valid_in_the_future_is_still_live() {
        let (identity, store, auditor) = setup();
        let sa = ServiceAccount::parse("skewed@proj.iam.gserviceaccount.com").unwrap();
        identity.add_key(
            &sa,
            KeyRecord {
                name: sa.key_resource_name("k1"),
                key_type: KeyType::UserManaged,
                key_algorithm: None,
                key_origin: None,
                valid_after_time: chrono::Utc::now() + chrono::Duration::seconds(2),
                valid_before_time: None,
            },
        );
        let credentials = serde_json::json!({
            "type": "service_account",
            "private_key_id": "k1",
            "client_email": sa.email(),
        });
        put(&store, "skewed", credentials.to_string().as_bytes()).await;

        match auditor.audit_secret("vault", "skewed").await.unwrap() {
            AuditFinding::Healthy { private_key_id, .. } => assert_eq!(private_key_id, "k1"),
            other => panic!("expected healthy, got {:?}", other),
        }
    }
}
