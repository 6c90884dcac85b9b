// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Secret Manager REST Adapter
//!
//! Implements [`SecretStore`] over the Secret Manager v1 REST API.
//! Payloads travel base64 encoded in both directions.
//!
//! # API Endpoints
//!
//! - `GET projects/{p}/secrets` - List secrets (paginated)
//! - `POST projects/{p}/secrets?secretId={id}` - Create secret
//! - `GET|DELETE {secret}` - Get / delete secret
//! - `POST {secret}:addVersion` - Append a version
//! - `GET {version}:access` - Read a version's payload
//! - `GET {secret}:getIamPolicy`, `POST {secret}:setIamPolicy` - IAM policy

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::error::UpstreamError;
use crate::domain::secret::{IamPolicy, Replication, Secret, SecretVersion};
use crate::domain::secret_store::SecretStore;
use crate::infrastructure::gcp::auth::TokenSource;
use crate::infrastructure::gcp::{build_client, error_from_response, transport_error};

const PAGE_SIZE: &str = "250";

pub struct SecretManagerRestClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListSecretsResponse {
    #[serde(default)]
    secrets: Vec<Secret>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Serialize)]
struct CreateSecretRequest {
    replication: Replication,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    data: String,
}

#[derive(Serialize)]
struct AddVersionRequest {
    payload: Payload,
}

#[derive(Deserialize)]
struct AccessResponse {
    payload: Payload,
}

#[derive(Serialize)]
struct SetIamPolicyRequest {
    policy: IamPolicy,
}

impl SecretManagerRestClient {
    /// `base_url` is the versioned API root, e.g. `https://secretmanager.googleapis.com/v1`.
    pub fn new(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, UpstreamError> {
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error(what, e))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, UpstreamError> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(what, e))
    }
}

#[async_trait]
impl SecretStore for SecretManagerRestClient {
    async fn list_secrets(&self, project: &str) -> Result<Vec<Secret>, UpstreamError> {
        let url = self.url(&format!("projects/{}/secrets", project));
        let mut secrets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }
            let page: ListSecretsResponse = self.send_json(request, "Secret Manager list secrets").await?;
            secrets.extend(page.secrets);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(project, count = secrets.len(), "listed secrets");
        Ok(secrets)
    }

    async fn create_secret(
        &self,
        project: &str,
        secret_id: &str,
        replication: Replication,
    ) -> Result<Secret, UpstreamError> {
        let request = self
            .client
            .post(self.url(&format!("projects/{}/secrets", project)))
            .query(&[("secretId", secret_id)])
            .json(&CreateSecretRequest { replication });
        self.send_json(request, "Secret Manager create secret").await
    }

    async fn get_secret(&self, name: &str) -> Result<Secret, UpstreamError> {
        let request = self.client.get(self.url(name));
        self.send_json(request, "Secret Manager get secret").await
    }

    async fn delete_secret(&self, name: &str) -> Result<(), UpstreamError> {
        let request = self.client.delete(self.url(name));
        self.send(request, "Secret Manager delete secret").await?;
        Ok(())
    }

    async fn add_secret_version(
        &self,
        secret_name: &str,
        payload: &[u8],
    ) -> Result<SecretVersion, UpstreamError> {
        let body = AddVersionRequest {
            payload: Payload {
                data: base64::engine::general_purpose::STANDARD.encode(payload),
            },
        };
        let request = self
            .client
            .post(self.url(&format!("{}:addVersion", secret_name)))
            .json(&body);
        self.send_json(request, "Secret Manager add version").await
    }

    async fn access_secret_version(&self, version_name: &str) -> Result<Vec<u8>, UpstreamError> {
        let request = self.client.get(self.url(&format!("{}:access", version_name)));
        let body: AccessResponse = self.send_json(request, "Secret Manager access version").await?;
        base64::engine::general_purpose::STANDARD
            .decode(body.payload.data)
            .map_err(|e| {
                UpstreamError::transport(format!("payload of {} is not base64: {}", version_name, e))
            })
    }

    async fn get_iam_policy(&self, resource: &str) -> Result<IamPolicy, UpstreamError> {
        let request = self
            .client
            .get(self.url(&format!("{}:getIamPolicy", resource)));
        self.send_json(request, "Secret Manager get IAM policy").await
    }

    async fn set_iam_policy(
        &self,
        resource: &str,
        policy: IamPolicy,
    ) -> Result<IamPolicy, UpstreamError> {
        let request = self
            .client
            .post(self.url(&format!("{}:setIamPolicy", resource)))
            .json(&SetIamPolicyRequest { policy });
        self.send_json(request, "Secret Manager set IAM policy").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::gcp::auth::StaticTokenSource;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> SecretManagerRestClient {
        SecretManagerRestClient::new(
            server.url(),
            Arc::new(StaticTokenSource::new("test-token")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_secrets_follows_pages() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/projects/vault/secrets")
            .match_query(Matcher::Exact("pageSize=250".into()))
            .with_status(200)
            .with_body(r#"{"secrets":[{"name":"projects/vault/secrets/a","replication":{"automatic":{}}}],"nextPageToken":"p2","totalSize":2}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/projects/vault/secrets")
            .match_query(Matcher::Exact("pageSize=250&pageToken=p2".into()))
            .with_status(200)
            .with_body(r#"{"secrets":[{"name":"projects/vault/secrets/b","replication":{"automatic":{}}}]}"#)
            .create_async()
            .await;

        let secrets = client(&server).list_secrets("vault").await.unwrap();
        let ids: Vec<&str> = secrets.iter().map(|s| s.secret_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_secret_with_automatic_replication() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/projects/vault/secrets")
            .match_query(Matcher::UrlEncoded("secretId".into(), "proj_app".into()))
            .match_body(Matcher::Json(serde_json::json!({"replication": {"automatic": {}}})))
            .with_status(200)
            .with_body(r#"{"name":"projects/123/secrets/proj_app","replication":{"automatic":{}},"createTime":"2024-01-01T00:00:00Z"}"#)
            .create_async()
            .await;

        let secret = client(&server)
            .create_secret("vault", "proj_app", Replication::default())
            .await
            .unwrap();
        assert_eq!(secret.secret_id(), "proj_app");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_missing_secret_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/projects/vault/secrets/nope")
            .with_status(404)
            .with_body(r#"{"error":{"code":404,"message":"Secret [projects/1/secrets/nope] not found.","status":"NOT_FOUND"}}"#)
            .create_async()
            .await;

        let err = client(&server)
            .get_secret("projects/vault/secrets/nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_version_payload_is_base64_both_ways() {
        let mut server = Server::new_async().await;
        let payload = b"{\"private_key_id\":\"k\"}\x00\xff";
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);

        let add = server
            .mock("POST", "/projects/vault/secrets/s:addVersion")
            .match_body(Matcher::Json(serde_json::json!({"payload": {"data": encoded}})))
            .with_status(200)
            .with_body(r#"{"name":"projects/vault/secrets/s/versions/3","state":"ENABLED"}"#)
            .create_async()
            .await;
        let access = server
            .mock("GET", "/projects/vault/secrets/s/versions/latest:access")
            .with_status(200)
            .with_body(format!(
                r#"{{"name":"projects/vault/secrets/s/versions/3","payload":{{"data":"{}"}}}}"#,
                encoded
            ))
            .create_async()
            .await;

        let sm = client(&server);
        let version = sm
            .add_secret_version("projects/vault/secrets/s", payload)
            .await
            .unwrap();
        assert_eq!(version.name, "projects/vault/secrets/s/versions/3");
        let read = sm
            .access_secret_version("projects/vault/secrets/s/versions/latest")
            .await
            .unwrap();
        assert_eq!(read, payload.to_vec());
        add.assert_async().await;
        access.assert_async().await;
    }

    #[tokio::test]
    async fn test_iam_policy_round_trip() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/projects/vault/secrets/s:getIamPolicy")
            .with_status(200)
            .with_body(r#"{"version":1,"etag":"BwW="}"#)
            .create_async()
            .await;
        let set = server
            .mock("POST", "/projects/vault/secrets/s:setIamPolicy")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "policy": {"etag": "BwW="}
            })))
            .with_status(200)
            .with_body(r#"{"version":1,"etag":"BwX=","bindings":[{"role":"roles/secretmanager.secretAccessor","members":["user:a@example.com"]}]}"#)
            .create_async()
            .await;

        let sm = client(&server);
        let mut policy = sm.get_iam_policy("projects/vault/secrets/s").await.unwrap();
        assert!(policy.bindings.is_empty());
        policy.grant("roles/secretmanager.secretAccessor", "user:a@example.com");
        let updated = sm
            .set_iam_policy("projects/vault/secrets/s", policy)
            .await
            .unwrap();
        assert_eq!(updated.etag.as_deref(), Some("BwX="));
        set.assert_async().await;
    }
}
