// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Finding Trigger
//!
//! Rotates a service account's key when a security scanner reports that the
//! key was not rotated. Findings arrive as Pub/Sub push messages whose data
//! is a Security Command Center finding:
//!
//! ```json
//! {"resource": {"parentDisplayName": "projects/p/serviceAccounts/sa@p.iam.gserviceaccount.com"}}
//! ```
//!
//! Only principals allowed by the configured [`TriggerPolicy`] are rotated;
//! anything else is skipped with a warning.

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::application::rotation::{BatchCoordinator, RotationRequest};
use crate::domain::config::TriggerPolicy;
use crate::domain::error::KeyOpsError;
use crate::domain::outcome::BatchReport;
use crate::domain::principal::ServiceAccount;

const PARENT_DISPLAY_NAME_PATTERN: &str =
    r"projects/([\w-]+)/serviceAccounts/([\w-]+@[\w-]+\.iam\.gserviceaccount\.com)$";

static PARENT_DISPLAY_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(PARENT_DISPLAY_NAME_PATTERN).expect("valid parent display name regex")
});

/// Pub/Sub push request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Base64 encoded finding JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Finding {
    resource: Option<FindingResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindingResource {
    parent_display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TriggerDecision {
    Rotated { report: BatchReport },
    Skipped { reason: String },
}

pub struct FindingTrigger {
    service_account_re: Regex,
    project_id_re: Regex,
    secret_manager_project_id: String,
    secret_name_prefix: String,
    delete_keys_days_old: f64,
    coordinator: BatchCoordinator,
}

impl FindingTrigger {
    pub fn new(policy: &TriggerPolicy, coordinator: BatchCoordinator) -> Result<Self, KeyOpsError> {
        let missing = policy.missing_fields();
        if !missing.is_empty() {
            return Err(KeyOpsError::validation(format!(
                "trigger policy is missing {}",
                missing.join(", ")
            )));
        }
        let compile = |field: &str, pattern: &Option<String>| {
            Regex::new(pattern.as_deref().unwrap_or_default()).map_err(|e| {
                KeyOpsError::validation(format!("trigger {} is not a valid regex: {}", field, e))
            })
        };

        Ok(Self {
            service_account_re: compile("service_account_regex", &policy.service_account_regex)?,
            project_id_re: compile("project_id_regex", &policy.project_id_regex)?,
            secret_manager_project_id: policy
                .secret_manager_project_id
                .clone()
                .unwrap_or_default(),
            secret_name_prefix: policy.secret_name_prefix.clone(),
            delete_keys_days_old: policy.delete_keys_days_old,
            coordinator,
        })
    }

    pub async fn handle(&self, envelope: &PushEnvelope) -> Result<TriggerDecision, KeyOpsError> {
        if let Some(id) = &envelope.message.message_id {
            debug!(message_id = %id, "received finding");
        }
        let (sa, project_id) = extract_principal(envelope)?;

        if !self.service_account_re.is_match(sa.email()) {
            let reason = format!(
                "{} did NOT match regular expression {}",
                sa,
                self.service_account_re.as_str()
            );
            warn!(target: "sa_keys::audit", "{}", reason);
            return Ok(TriggerDecision::Skipped { reason });
        }
        if !self.project_id_re.is_match(&project_id) {
            let reason = format!(
                "Project ID {} did NOT match regular expression {}",
                project_id,
                self.project_id_re.as_str()
            );
            warn!(target: "sa_keys::audit", "{}", reason);
            return Ok(TriggerDecision::Skipped { reason });
        }

        let request = RotationRequest::parse(
            sa.email(),
            Some(&self.secret_name_prefix),
            &self.secret_manager_project_id,
            self.delete_keys_days_old,
        )?;
        let report = self.coordinator.rotate(request).await;
        Ok(TriggerDecision::Rotated { report })
    }
}

/// Pull the principal and the project it belongs to out of a finding.
pub fn extract_principal(envelope: &PushEnvelope) -> Result<(ServiceAccount, String), KeyOpsError> {
    let data = envelope
        .message
        .data
        .as_deref()
        .ok_or_else(|| KeyOpsError::validation("push message does not contain data"))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| KeyOpsError::validation(format!("push message data is not base64: {}", e)))?;
    let finding: Finding = serde_json::from_slice(&decoded)
        .map_err(|e| KeyOpsError::validation(format!("finding is not valid JSON: {}", e)))?;

    let parent = finding
        .resource
        .ok_or_else(|| KeyOpsError::validation("finding does not contain key resource"))?
        .parent_display_name
        .ok_or_else(|| KeyOpsError::validation("finding does not contain key parentDisplayName"))?;

    let caps = PARENT_DISPLAY_NAME_RE.captures(&parent).ok_or_else(|| {
        KeyOpsError::validation(format!(
            "finding.resource.parentDisplayName failed to match regular expression {}",
            PARENT_DISPLAY_NAME_PATTERN
        ))
    })?;
    let project_id = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let sa = ServiceAccount::parse(caps.get(2).map(|m| m.as_str()).unwrap_or_default())?;
    debug!(service_account = %sa, project_id, "extracted principal from finding");
    Ok((sa, project_id.to_string()))
}
