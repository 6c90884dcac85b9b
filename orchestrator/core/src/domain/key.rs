// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Service Account Keys
//!
//! - [`KeyMaterial`]: the decoded credentials file returned when a key is
//!   created. Zeroized on drop, redacted in `Debug`, not serializable.
//! - [`CreatedKey`]: the non-secret fields of that credentials file. The
//!   `private_key` field is never captured.
//! - [`KeyRecord`]: upstream metadata about an existing key.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Key value objects shared by the generator, publisher and reaper

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::error::KeyOpsError;

/// Check a key age threshold in days. Fractions are allowed; negative,
/// NaN and infinite values are not.
pub fn validate_age_days(days: f64) -> Result<f64, KeyOpsError> {
    if !days.is_finite() || days < 0.0 {
        return Err(KeyOpsError::validation(format!(
            "days must be a non-negative number, got {}",
            days
        )));
    }
    Ok(days)
}

/// Parse a key age threshold from a path segment.
pub fn parse_age_days(raw: &str) -> Result<f64, KeyOpsError> {
    let days = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| KeyOpsError::validation(format!("days '{}' is not a number", raw)))?;
    validate_age_days(days)
}

/// Decoded key material. Consumed once by the secret publisher.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

impl AsRef<[u8]> for KeyMaterial {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Public fields of a Google credentials file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedKey {
    pub client_email: String,
    pub private_key_id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl CreatedKey {
    /// Read the public fields out of a credentials file. Unknown fields,
    /// `private_key` included, are ignored.
    pub fn from_material(material: &KeyMaterial) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(material.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    UserManaged,
    SystemManaged,
    #[serde(other)]
    KeyTypeUnspecified,
}

/// Metadata about one key of a service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub name: String,
    pub key_type: KeyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_origin: Option<String>,
    pub valid_after_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_before_time: Option<DateTime<Utc>>,
}

impl KeyRecord {
    pub fn is_user_managed(&self) -> bool {
        self.key_type == KeyType::UserManaged
    }

    /// True when the key became valid strictly more than `days` ago.
    /// Fractional days are honoured down to the millisecond.
    pub fn is_older_than(&self, days: f64, now: DateTime<Utc>) -> bool {
        let threshold = Duration::milliseconds((days * 86_400_000.0) as i64);
        now - self.valid_after_time > threshold
    }

    /// Last path segment of the resource name.
    pub fn key_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}
