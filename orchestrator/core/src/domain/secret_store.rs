// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Secret Store Port
//!
//! Domain interface over the versioned secret storage service (Google
//! Secret Manager). Resource names are full paths as built by
//! [`crate::domain::secret::secret_path`].

use async_trait::async_trait;

use crate::domain::error::UpstreamError;
use crate::domain::secret::{IamPolicy, Replication, Secret, SecretVersion};

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Every secret in `project`.
    async fn list_secrets(&self, project: &str) -> Result<Vec<Secret>, UpstreamError>;

    async fn create_secret(
        &self,
        project: &str,
        secret_id: &str,
        replication: Replication,
    ) -> Result<Secret, UpstreamError>;

    /// Fails with a 404 [`UpstreamError`] when the secret does not exist.
    async fn get_secret(&self, name: &str) -> Result<Secret, UpstreamError>;

    async fn delete_secret(&self, name: &str) -> Result<(), UpstreamError>;

    /// Append a version holding `payload` to the secret `secret_name`.
    async fn add_secret_version(
        &self,
        secret_name: &str,
        payload: &[u8],
    ) -> Result<SecretVersion, UpstreamError>;

    /// Payload of a version; `version_name` may end in `versions/latest`.
    async fn access_secret_version(&self, version_name: &str) -> Result<Vec<u8>, UpstreamError>;

    async fn get_iam_policy(&self, resource: &str) -> Result<IamPolicy, UpstreamError>;

    async fn set_iam_policy(
        &self,
        resource: &str,
        policy: IamPolicy,
    ) -> Result<IamPolicy, UpstreamError>;
}
