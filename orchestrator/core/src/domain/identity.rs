// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Identity Service Port
//!
//! Domain interface over the service that owns service-account keys (Google
//! IAM). Implementations live in `crate::infrastructure`.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary for the key management API

use async_trait::async_trait;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::error::UpstreamError;
use crate::domain::key::KeyRecord;
use crate::domain::principal::ServiceAccount;

/// Private key format requested on creation.
pub const CREDENTIALS_FILE_KEY_TYPE: &str = "TYPE_GOOGLE_CREDENTIALS_FILE";

/// Key returned by [`IdentityService::create_key`]. The encoded credentials
/// are wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct NewKey {
    /// Resource name of the created key.
    #[zeroize(skip)]
    pub name: String,
    /// Base64 encoded credentials file as returned upstream.
    pub private_key_data: String,
}

impl fmt::Debug for NewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewKey")
            .field("name", &self.name)
            .field("private_key_data", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// All keys of `sa`, system managed ones included.
    async fn list_keys(&self, sa: &ServiceAccount) -> Result<Vec<KeyRecord>, UpstreamError>;

    /// Mint a new key for `sa` in [`CREDENTIALS_FILE_KEY_TYPE`] format.
    async fn create_key(&self, sa: &ServiceAccount) -> Result<NewKey, UpstreamError>;

    /// Delete a key by its full resource name.
    async fn delete_key(&self, key_name: &str) -> Result<(), UpstreamError>;
}
