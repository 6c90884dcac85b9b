// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Secret containers, versions and IAM policies as seen by the secret store.

use serde::{Deserialize, Serialize};

pub const SECRET_ACCESSOR_ROLE: &str = "roles/secretmanager.secretAccessor";

/// `projects/<project>/secrets/<secret_id>`
pub fn secret_path(project: &str, secret_id: &str) -> String {
    format!("projects/{}/secrets/{}", project, secret_id)
}

/// `projects/<project>/secrets/<secret_id>/versions/<version>`
pub fn secret_version_path(project: &str, secret_id: &str, version: &str) -> String {
    format!("{}/versions/{}", secret_path(project, secret_id), version)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    /// Full resource name, `projects/*/secrets/*`.
    pub name: String,
    #[serde(default)]
    pub replication: Replication,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
}

impl Secret {
    /// Trailing secret id of the resource name.
    pub fn secret_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Replication {
    Automatic {},
    UserManaged { replicas: Vec<Replica> },
}

impl Default for Replication {
    fn default() -> Self {
        Replication::Automatic {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretVersion {
    /// Full resource name, `projects/*/secrets/*/versions/*`.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    pub members: Vec<String>,
}

impl IamPolicy {
    /// Add `member` to `role`, creating the binding if needed.
    /// Returns false when the member already had the role.
    pub fn grant(&mut self, role: &str, member: &str) -> bool {
        match self.bindings.iter_mut().find(|b| b.role == role) {
            Some(binding) => {
                if binding.members.iter().any(|m| m == member) {
                    return false;
                }
                binding.members.push(member.to_string());
            }
            None => self.bindings.push(Binding {
                role: role.to_string(),
                members: vec![member.to_string()],
            }),
        }
        true
    }
}
