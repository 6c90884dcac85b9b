// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP API
//!
//! | Method | Path | Body |
//! |--------|------|------|
//! | GET | `/health` | |
//! | PUT | `/projects/{project}/audit-secrets` | JSON `{"secret-regex": ".."}` |
//! | PUT | `/gen-sa-keys-add-secrets/delete-keys-days-old/{days}` | form `GCP_SAs`, `secret_name_prefix`, `secret_manager_project_id` |
//! | DELETE | `/sa-keys` | form `sa-key-names` |
//!
//! Form bodies may be urlencoded or multipart. A missing body or a body
//! that cannot be read is a 400.
//!
//! | GET | `/sa/{sa}/keys` | |
//! | GET, DELETE | `/sa/{sa}/keys-days-older/{days}` | |
//! | PUT | `/projects/{project}/secrets/{secret}/accessors` | JSON `{"member": ".."}` |
//! | POST | `/findings` | Pub/Sub push envelope (only when the trigger is configured) |
//!
//! Batch endpoints answer with the worst per-unit status and the full report.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::application::{
    BatchCoordinator, FindingTrigger, KeyReaper, PushEnvelope, RotationRequest, SecretAuditor,
    SecretPublisher, TriggerDecision, WorkerPool,
};
use crate::domain::config::SaKeysConfig;
use crate::domain::error::KeyOpsError;
use crate::domain::identity::IdentityService;
use crate::domain::key::parse_age_days;
use crate::domain::principal::{SecretNamePrefix, ServiceAccount};
use crate::domain::secret_store::SecretStore;
use crate::presentation::error::status_from_code;
use crate::presentation::extract::{FormFields, JsonBody};

pub struct AppState {
    pub config: SaKeysConfig,
    pub coordinator: BatchCoordinator,
    pub auditor: SecretAuditor,
    pub reaper: KeyReaper,
    pub publisher: SecretPublisher,
    /// Present only when `spec.trigger` is configured.
    pub trigger: Option<FindingTrigger>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire every service onto the two ports. The ports are shared, never
    /// rebuilt per request.
    pub fn new(
        config: SaKeysConfig,
        identity: Arc<dyn IdentityService>,
        store: Arc<dyn SecretStore>,
    ) -> anyhow::Result<Self> {
        let pool = WorkerPool::new(config.spec.workers.max_workers);
        let coordinator = BatchCoordinator::new(identity.clone(), store.clone(), pool);
        let trigger = config
            .spec
            .trigger
            .as_ref()
            .map(|policy| FindingTrigger::new(policy, coordinator.clone()))
            .transpose()?;

        Ok(Self {
            auditor: SecretAuditor::new(identity.clone(), store.clone(), pool),
            reaper: KeyReaper::new(identity),
            publisher: SecretPublisher::new(store),
            coordinator,
            trigger,
            config,
            start_time: Instant::now(),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/projects/{project}/audit-secrets", put(audit_secrets_handler))
        .route(
            "/gen-sa-keys-add-secrets/delete-keys-days-old/{days}",
            put(rotate_keys_handler),
        )
        .route("/sa-keys", axum::routing::delete(delete_keys_handler))
        .route("/sa/{sa}/keys", get(list_keys_handler))
        .route(
            "/sa/{sa}/keys-days-older/{days}",
            get(old_keys_handler).delete(delete_old_keys_handler),
        )
        .route(
            "/projects/{project}/secrets/{secret}/accessors",
            put(grant_access_handler),
        );

    if state.trigger.is_some() {
        router = router.route("/findings", post(findings_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.start_time.elapsed().as_secs(),
    }))
}

#[derive(Debug, Deserialize)]
struct AuditSecretsRequest {
    #[serde(rename = "secret-regex", default)]
    secret_regex: Option<String>,
}

async fn audit_secrets_handler(
    State(state): State<Arc<AppState>>,
    Path(project): Path<String>,
    JsonBody(request): JsonBody<AuditSecretsRequest>,
) -> Result<Response, KeyOpsError> {
    let regex = request
        .secret_regex
        .filter(|r| !r.is_empty())
        .ok_or_else(|| KeyOpsError::validation("secret-regex is required"))?;

    let report = state.auditor.audit_project(&project, &regex).await?;
    Ok((status_from_code(report.status), Json(report)).into_response())
}

#[derive(Debug, Deserialize)]
struct RotateKeysForm {
    #[serde(rename = "GCP_SAs", default)]
    service_accounts: Option<String>,
    #[serde(default)]
    secret_name_prefix: Option<String>,
    #[serde(default)]
    secret_manager_project_id: Option<String>,
}

async fn rotate_keys_handler(
    State(state): State<Arc<AppState>>,
    Path(days): Path<String>,
    FormFields(form): FormFields<RotateKeysForm>,
) -> Result<Response, KeyOpsError> {
    let days = parse_age_days(&days)?;
    let service_accounts = form
        .service_accounts
        .ok_or_else(|| KeyOpsError::validation("GCP_SAs is required"))?;
    let prefix = form
        .secret_name_prefix
        .unwrap_or_else(|| state.config.spec.rotation.secret_name_prefix.clone());
    let project = form
        .secret_manager_project_id
        .filter(|p| !p.trim().is_empty())
        .or_else(|| state.config.project_id().map(str::to_string))
        .ok_or_else(|| {
            KeyOpsError::validation(
                "secret_manager_project_id is required when no default project is configured",
            )
        })?;

    let request = RotationRequest::parse(&service_accounts, Some(&prefix), &project, days)?;
    let report = state.coordinator.rotate(request).await;
    Ok((status_from_code(report.status), Json(report)).into_response())
}

#[derive(Debug, Deserialize)]
struct DeleteKeysForm {
    #[serde(rename = "sa-key-names", default)]
    key_names: Option<String>,
}

async fn delete_keys_handler(
    State(state): State<Arc<AppState>>,
    FormFields(form): FormFields<DeleteKeysForm>,
) -> Result<Response, KeyOpsError> {
    let names: Vec<String> = form
        .key_names
        .ok_or_else(|| KeyOpsError::validation("sa-key-names is required"))?
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();

    let report = state.reaper.delete_keys(&names).await?;
    Ok((status_from_code(report.status()), Json(report)).into_response())
}

async fn list_keys_handler(
    State(state): State<Arc<AppState>>,
    Path(sa): Path<String>,
) -> Result<Response, KeyOpsError> {
    let sa = ServiceAccount::parse(&sa)?;
    let keys = state.reaper.list_keys(&sa).await?;
    Ok(Json(keys).into_response())
}

async fn old_keys_handler(
    State(state): State<Arc<AppState>>,
    Path((sa, days)): Path<(String, String)>,
) -> Result<Response, KeyOpsError> {
    let sa = ServiceAccount::parse(&sa)?;
    let days = parse_age_days(&days)?;
    let keys = state.reaper.keys_older_than(&sa, days).await?;
    Ok(Json(keys).into_response())
}

async fn delete_old_keys_handler(
    State(state): State<Arc<AppState>>,
    Path((sa, days)): Path<(String, String)>,
) -> Result<Response, KeyOpsError> {
    let sa = ServiceAccount::parse(&sa)?;
    let days = parse_age_days(&days)?;
    let report = state.reaper.delete_keys_older_than(&sa, days).await?;
    Ok((status_from_code(report.status()), Json(report)).into_response())
}

#[derive(Debug, Deserialize)]
struct GrantAccessRequest {
    member: String,
}

async fn grant_access_handler(
    State(state): State<Arc<AppState>>,
    Path((project, secret)): Path<(String, String)>,
    JsonBody(request): JsonBody<GrantAccessRequest>,
) -> Result<Response, KeyOpsError> {
    if secret.is_empty() || SecretNamePrefix::parse(&secret).is_err() {
        return Err(KeyOpsError::validation(format!("'{}' is not a valid secret id", secret)));
    }
    let member = request.member.trim();
    if !member.contains(':') {
        return Err(KeyOpsError::validation(format!(
            "member '{}' must be of the form type:identity, e.g. serviceAccount:sa@project.iam.gserviceaccount.com",
            member
        )));
    }

    let policy = state.publisher.grant_access(&project, &secret, member).await?;
    Ok(Json(policy).into_response())
}

async fn findings_handler(
    State(state): State<Arc<AppState>>,
    JsonBody(envelope): JsonBody<PushEnvelope>,
) -> Result<Response, KeyOpsError> {
    let trigger = state
        .trigger
        .as_ref()
        .ok_or_else(|| KeyOpsError::NotFound("finding trigger is not configured".to_string()))?;

    let decision = trigger.handle(&envelope).await?;
    let status = match &decision {
        TriggerDecision::Rotated { report } => status_from_code(report.status),
        TriggerDecision::Skipped { .. } => axum::http::StatusCode::OK,
    };
    Ok((status, Json(decision)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory::{InMemoryIdentityService, InMemorySecretStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn config() -> SaKeysConfig {
        let mut config = SaKeysConfig::default();
        config.spec.gcp.project_id = Some("vault".to_string());
        config
    }

    fn app(identity: Arc<InMemoryIdentityService>, store: Arc<InMemorySecretStore>) -> Router {
        router(Arc::new(AppState::new(config(), identity, store).unwrap()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn form(method: &str, uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(Arc::new(InMemoryIdentityService::new()), Arc::new(InMemorySecretStore::new()));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_rotation_with_missing_account_is_404() {
        let identity = Arc::new(InMemoryIdentityService::new());
        let store = Arc::new(InMemorySecretStore::new());
        identity.add_account(&ServiceAccount::parse("a@proj.iam.gserviceaccount.com").unwrap());
        let app = app(identity, store);

        let response = app
            .oneshot(form(
                "PUT",
                "/gen-sa-keys-add-secrets/delete-keys-days-old/0",
                "GCP_SAs=a%40proj.iam.gserviceaccount.com%2Cb%40proj.iam.gserviceaccount.com",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["results"].as_array().unwrap().len(), 2);
        assert_eq!(body["summary"], "partial_success");
    }

    #[tokio::test]
    async fn test_rotation_rejects_bad_principal_before_any_call() {
        let identity = Arc::new(InMemoryIdentityService::new());
        let app = app(identity.clone(), Arc::new(InMemorySecretStore::new()));

        let response = app
            .oneshot(form(
                "PUT",
                "/gen-sa-keys-add-secrets/delete-keys-days-old/1",
                "GCP_SAs=a%40proj.iam.gserviceaccount.com%2Cnot-an-account",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(identity.create_key_calls(), 0);
    }

    #[tokio::test]
    async fn test_negative_days_is_400() {
        let app = app(Arc::new(InMemoryIdentityService::new()), Arc::new(InMemorySecretStore::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/sa/a%40proj.iam.gserviceaccount.com/keys-days-older/-3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_old_keys_empty_list_is_ok() {
        let identity = Arc::new(InMemoryIdentityService::new());
        identity.add_account(&ServiceAccount::parse("a@proj.iam.gserviceaccount.com").unwrap());
        let app = app(identity, Arc::new(InMemorySecretStore::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/sa/a@proj.iam.gserviceaccount.com/keys-days-older/30")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_delete_keys_requires_field() {
        let app = app(Arc::new(InMemoryIdentityService::new()), Arc::new(InMemorySecretStore::new()));
        let response = app.oneshot(form("DELETE", "/sa-keys", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_audit_requires_regex() {
        let app = app(Arc::new(InMemoryIdentityService::new()), Arc::new(InMemorySecretStore::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/projects/vault/audit-secrets")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_findings_route_absent_without_trigger() {
        let app = app(Arc::new(InMemoryIdentityService::new()), Arc::new(InMemorySecretStore::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/findings")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"message":{}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_rotation_without_body_is_400() {
        let identity = Arc::new(InMemoryIdentityService::new());
        let app = app(identity.clone(), Arc::new(InMemorySecretStore::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/gen-sa-keys-add-secrets/delete-keys-days-old/0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(identity.create_key_calls(), 0);
    }

    #[tokio::test]
    async fn test_rotation_accepts_multipart_form() {
        let identity = Arc::new(InMemoryIdentityService::new());
        let account = ServiceAccount::parse("a@proj.iam.gserviceaccount.com").unwrap();
        identity.add_account(&account);
        let app = app(identity.clone(), Arc::new(InMemorySecretStore::new()));

        let body = "--XBOUNDARY\r\n\
                    Content-Disposition: form-data; name=\"GCP_SAs\"\r\n\r\n\
                    a@proj.iam.gserviceaccount.com\r\n\
                    --XBOUNDARY--\r\n";
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/gen-sa-keys-add-secrets/delete-keys-days-old/0")
                    .header("content-type", "multipart/form-data; boundary=XBOUNDARY")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(identity.keys_of(&account).len(), 1);
    }

    #[tokio::test]
    async fn test_audit_without_body_is_400() {
        let app = app(Arc::new(InMemoryIdentityService::new()), Arc::new(InMemorySecretStore::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/projects/vault/audit-secrets")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], 400);
    }

    #[tokio::test]
    async fn test_delete_keys_without_content_type_is_400() {
        let app = app(Arc::new(InMemoryIdentityService::new()), Arc::new(InMemorySecretStore::new()));
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/sa-keys")
                    .body(Body::from("sa-key-names=x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
