// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Principal and Resource Names
//!
//! Value objects for the identifiers that cross the service boundary:
//!
//! | Type | Shape |
//! |------|-------|
//! | [`ServiceAccount`] | `<local>@<project>.iam.gserviceaccount.com` |
//! | [`KeyResourceName`] | `projects/<project>/serviceAccounts/<sa>/keys/<id>` |
//! | [`SecretNamePrefix`] | empty, or letters, digits, `-` and `_` |
//!
//! All of them are validated on construction, so holding one is proof the
//! string has the right shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::KeyOpsError;

pub const SERVICE_ACCOUNT_PATTERN: &str = r"^([\w-]+)@([\w-]+)\.iam\.gserviceaccount\.com$";
pub const KEY_RESOURCE_NAME_PATTERN: &str =
    r"^projects/([\w-]+)/serviceAccounts/([\w@-]+)\.iam\.gserviceaccount\.com/keys/(\w+)$";
pub const SECRET_NAME_PATTERN: &str = r"^[\w-]+$";

static SERVICE_ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SERVICE_ACCOUNT_PATTERN).expect("valid service account regex"));
static KEY_RESOURCE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(KEY_RESOURCE_NAME_PATTERN).expect("valid key name regex"));
static SECRET_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SECRET_NAME_PATTERN).expect("valid secret name regex"));

/// A Google service account email.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceAccount {
    email: String,
    local_part_len: usize,
    project_start: usize,
    project_end: usize,
}

impl ServiceAccount {
    pub fn parse(email: &str) -> Result<Self, KeyOpsError> {
        let email = email.trim();
        let caps = SERVICE_ACCOUNT_RE.captures(email).ok_or_else(|| {
            KeyOpsError::validation(format!(
                "service account '{}' does not match {}",
                email, SERVICE_ACCOUNT_PATTERN
            ))
        })?;
        // Both groups always participate when the pattern matches.
        let local = caps.get(1).map(|m| m.end()).unwrap_or_default();
        let project = caps.get(2).map(|m| (m.start(), m.end())).unwrap_or_default();
        Ok(Self {
            email: email.to_string(),
            local_part_len: local,
            project_start: project.0,
            project_end: project.1,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// The part before `@`.
    pub fn local_part(&self) -> &str {
        &self.email[..self.local_part_len]
    }

    /// The project that owns the account.
    pub fn project_id(&self) -> &str {
        &self.email[self.project_start..self.project_end]
    }

    /// `projects/-/serviceAccounts/<email>`, the form the IAM API accepts
    /// without knowing the owning project.
    pub fn wildcard_resource_name(&self) -> String {
        format!("projects/-/serviceAccounts/{}", self.email)
    }

    /// Resource name of one of this account's keys.
    pub fn key_resource_name(&self, key_id: &str) -> String {
        format!(
            "projects/{}/serviceAccounts/{}/keys/{}",
            self.project_id(),
            self.email,
            key_id
        )
    }
}

impl fmt::Display for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.email)
    }
}

impl TryFrom<String> for ServiceAccount {
    type Error = KeyOpsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceAccount> for String {
    fn from(value: ServiceAccount) -> Self {
        value.email
    }
}

/// Parse a comma-separated list of service accounts, failing on the first
/// malformed entry.
pub fn parse_service_accounts(list: &str) -> Result<Vec<ServiceAccount>, KeyOpsError> {
    if list.trim().is_empty() {
        return Err(KeyOpsError::validation("no service accounts supplied"));
    }
    list.split(',').map(ServiceAccount::parse).collect()
}

/// Full resource name of a service account key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyResourceName {
    name: String,
    key_id_start: usize,
}

impl KeyResourceName {
    pub fn parse(name: &str) -> Result<Self, KeyOpsError> {
        let name = name.trim();
        let caps = KEY_RESOURCE_NAME_RE.captures(name).ok_or_else(|| {
            KeyOpsError::validation(format!(
                "key name '{}' is not in the format of \
                 projects/PROJECT_ID/serviceAccounts/sa@PROJECT_ID.iam.gserviceaccount.com/keys/KEY_ID",
                name
            ))
        })?;
        let key_id_start = caps.get(3).map(|m| m.start()).unwrap_or(name.len());
        Ok(Self {
            name: name.to_string(),
            key_id_start,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn key_id(&self) -> &str {
        &self.name[self.key_id_start..]
    }
}

impl fmt::Display for KeyResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TryFrom<String> for KeyResourceName {
    type Error = KeyOpsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<KeyResourceName> for String {
    fn from(value: KeyResourceName) -> Self {
        value.name
    }
}

/// Prefix prepended to generated secret ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretNamePrefix(String);

impl SecretNamePrefix {
    pub fn parse(prefix: &str) -> Result<Self, KeyOpsError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Self::default());
        }
        if !SECRET_NAME_RE.is_match(prefix) {
            return Err(KeyOpsError::validation(
                "Secret names can only contain English letters (A-Z), numbers (0-9), \
                 dashes (-), and underscores (_)",
            ));
        }
        Ok(Self(prefix.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Secret id holding the keys of `sa`: `<prefix><project>_<local-part>`.
    pub fn secret_id_for(&self, sa: &ServiceAccount) -> String {
        format!("{}{}_{}", self.0, sa.project_id(), sa.local_part())
    }
}

impl TryFrom<String> for SecretNamePrefix {
    type Error = KeyOpsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SecretNamePrefix> for String {
    fn from(value: SecretNamePrefix) -> Self {
        value.0
    }
}
