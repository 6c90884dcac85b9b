// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Secret Publisher
//!
//! Stores key material as a new secret version:
//!
//! 1. look the secret container up,
//! 2. create it with automatic replication when the lookup says 404,
//! 3. append a version carrying the payload.
//!
//! A container created in step 2 stays in place even when step 3 fails;
//! a retry finds it in step 1.
//!
//! Also grants principals read access to a secret through its IAM policy.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::error::UpstreamError;
use crate::domain::key::KeyMaterial;
use crate::domain::secret::{secret_path, IamPolicy, Replication, SECRET_ACCESSOR_ROLE};
use crate::domain::secret_store::SecretStore;

/// Where the material ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedSecret {
    /// Set when the container already existed.
    pub found_secret: Option<String>,
    /// Set when this call created the container.
    pub created_secret: Option<String>,
    pub added_secret_version: String,
}

pub struct SecretPublisher {
    store: Arc<dyn SecretStore>,
}

impl SecretPublisher {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Consumes `material`; it is zeroized when this returns.
    pub async fn publish(
        &self,
        project: &str,
        secret_id: &str,
        material: KeyMaterial,
    ) -> Result<PublishedSecret, UpstreamError> {
        let name = secret_path(project, secret_id);

        let (found_secret, created_secret) = match self.store.get_secret(&name).await {
            Ok(secret) => (Some(secret.name), None),
            Err(e) if e.is_not_found() => {
                debug!(secret = %name, "secret not found, creating it");
                let created = self
                    .store
                    .create_secret(project, secret_id, Replication::default())
                    .await?;
                info!(secret = %created.name, "created secret");
                (None, Some(created.name))
            }
            Err(e) => return Err(e),
        };

        let version = self
            .store
            .add_secret_version(&name, material.as_bytes())
            .await?;
        info!(version = %version.name, "added secret version");

        Ok(PublishedSecret {
            found_secret,
            created_secret,
            added_secret_version: version.name,
        })
    }

    /// Give `member` (e.g. `serviceAccount:x@p.iam.gserviceaccount.com`)
    /// the secret accessor role on the secret. Returns the policy in force
    /// afterwards; nothing is written when the member already had the role.
    pub async fn grant_access(
        &self,
        project: &str,
        secret_id: &str,
        member: &str,
    ) -> Result<IamPolicy, UpstreamError> {
        let name = secret_path(project, secret_id);
        let mut policy = self.store.get_iam_policy(&name).await?;

        if !policy.grant(SECRET_ACCESSOR_ROLE, member) {
            debug!(secret = %name, member, "member already has accessor role");
            return Ok(policy);
        }

        let updated = self.store.set_iam_policy(&name, policy).await?;
        info!(secret = %name, member, "granted secret accessor role");
        Ok(updated)
    }
}
