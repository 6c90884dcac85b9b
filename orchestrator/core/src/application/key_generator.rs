// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Key Generator
//!
//! Mints a new credentials-file key for a service account and decodes it.
//! The returned material is never logged.

use base64::Engine;
use std::sync::Arc;
use tracing::{error, info, warn};
use zeroize::Zeroize;

use crate::domain::error::{KeyOpsError, UpstreamError, STATUS_INTERNAL};
use crate::domain::identity::IdentityService;
use crate::domain::key::{CreatedKey, KeyMaterial};
use crate::domain::principal::ServiceAccount;

/// A freshly minted key: the secret bytes and their public description.
#[derive(Debug)]
pub struct GeneratedKey {
    /// Upstream resource name of the key.
    pub name: String,
    pub created: CreatedKey,
    pub material: KeyMaterial,
}

pub struct KeyGenerator {
    identity: Arc<dyn IdentityService>,
}

impl KeyGenerator {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self { identity }
    }

    /// Mint and decode a key. A key whose payload cannot be decoded is
    /// deleted again before the error is returned.
    pub async fn generate(&self, sa: &ServiceAccount) -> Result<GeneratedKey, KeyOpsError> {
        let mut new_key = self.identity.create_key(sa).await?;
        let name = new_key.name.clone();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(new_key.private_key_data.trim())
            .map_err(|e| format!("key {} has undecodable privateKeyData: {}", name, e));
        new_key.private_key_data.zeroize();

        let parsed = decoded.and_then(|bytes| {
            let material = KeyMaterial::new(bytes);
            CreatedKey::from_material(&material)
                .map(|created| (created, material))
                .map_err(|e| format!("key {} payload is not a credentials file: {}", name, e))
        });

        let (created, material) = match parsed {
            Ok(parsed) => parsed,
            Err(message) => {
                let original = UpstreamError::new(STATUS_INTERNAL, message);
                return Err(self.discard(&name, original).await);
            }
        };

        info!(
            service_account = %sa,
            key = %name,
            "created service account key"
        );
        metrics::counter!("sa_keys_keys_created_total").increment(1);

        Ok(GeneratedKey {
            name,
            created,
            material,
        })
    }

    /// Delete a key that cannot be handed out.
    async fn discard(&self, key_name: &str, original: UpstreamError) -> KeyOpsError {
        warn!(key = %key_name, error = %original.message, "unusable key payload, deleting key");
        metrics::counter!("sa_keys_compensations_total").increment(1);

        match self.identity.delete_key(key_name).await {
            Ok(()) => {
                info!(key = %key_name, "deleted unusable key");
                KeyOpsError::Upstream(original)
            }
            Err(compensation) => {
                error!(
                    target: "sa_keys::audit",
                    key = %key_name,
                    error = %compensation,
                    "failed to delete unusable key, it may be orphaned"
                );
                KeyOpsError::CompensationFailure {
                    key_name: key_name.to_string(),
                    original,
                    compensation,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::InMemoryIdentityService;

    fn sa() -> ServiceAccount {
        ServiceAccount::parse("app@proj.iam.gserviceaccount.com").unwrap()
    }

    #[tokio::test]
    async fn test_generate_decodes_credentials_file() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.add_account(&sa());
        let generator = KeyGenerator::new(identity.clone());

        let key = generator.generate(&sa()).await.unwrap();
        assert_eq!(key.created.client_email, "app@proj.iam.gserviceaccount.com");
        assert!(key.name.ends_with(&key.created.private_key_id));
        assert!(String::from_utf8_lossy(key.material.as_bytes()).contains("private_key"));
        assert_eq!(identity.keys_of(&sa()).len(), 1);
    }

    #[tokio::test]
    async fn test_generate_unknown_account_is_not_found() {
        let identity = Arc::new(InMemoryIdentityService::new());
        let generator = KeyGenerator::new(identity.clone());

        let err = generator.generate(&sa()).await.unwrap_err();
        assert!(matches!(err, KeyOpsError::NotFound(_)));
        assert!(identity.keys_of(&sa()).is_empty());
        assert!(identity.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_key_is_deleted() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.add_account(&sa());
        identity.corrupt_key_data(&sa());
        let generator = KeyGenerator::new(identity.clone());

        let err = generator.generate(&sa()).await.unwrap_err();
        assert!(matches!(err, KeyOpsError::Upstream(_)));
        assert_eq!(err.status_code(), 500);
        assert_eq!(identity.delete_calls().len(), 1);
        assert!(identity.keys_of(&sa()).is_empty());
    }

    #[tokio::test]
    async fn test_undeletable_garbled_key_is_compensation_failure() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.add_account(&sa());
        identity.corrupt_key_data(&sa());
        identity.fail_all_deletes(UpstreamError::new(403, "PERMISSION_DENIED: nope"));
        let generator = KeyGenerator::new(identity.clone());

        let err = generator.generate(&sa()).await.unwrap_err();
        match &err {
            KeyOpsError::CompensationFailure {
                key_name,
                original,
                compensation,
            } => {
                assert_eq!(key_name, &identity.keys_of(&sa())[0].name);
                assert_eq!(original.status, 500);
                assert_eq!(compensation.status, 403);
            }
            other => panic!("expected compensation failure, got {:?}", other),
        }
        assert_eq!(err.status_code(), 500);
    }
}
