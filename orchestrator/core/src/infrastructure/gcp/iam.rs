// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! IAM REST Adapter
//!
//! Implements [`IdentityService`] over the IAM v1 REST API.
//!
//! # API Endpoints
//!
//! - `GET projects/-/serviceAccounts/{email}/keys` - List keys
//! - `POST projects/-/serviceAccounts/{email}/keys` - Create key
//! - `DELETE {key name}` - Delete key

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::UpstreamError;
use crate::domain::identity::{IdentityService, NewKey, CREDENTIALS_FILE_KEY_TYPE};
use crate::domain::key::KeyRecord;
use crate::domain::principal::ServiceAccount;
use crate::infrastructure::gcp::auth::TokenSource;
use crate::infrastructure::gcp::{build_client, error_from_response, transport_error};

pub struct IamRestClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Deserialize)]
struct ListKeysResponse {
    #[serde(default)]
    keys: Vec<KeyRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyRequest<'a> {
    private_key_type: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateKeyResponse {
    name: String,
    private_key_data: String,
}

impl IamRestClient {
    /// `base_url` is the versioned API root, e.g. `https://iam.googleapis.com/v1`.
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

    fn keys_url(&self, sa: &ServiceAccount) -> String {
        format!("{}/{}/keys", self.base_url, sa.wildcard_resource_name())
    }
}

#[async_trait]
impl IdentityService for IamRestClient {
    async fn list_keys(&self, sa: &ServiceAccount) -> Result<Vec<KeyRecord>, UpstreamError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .get(self.keys_url(sa))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("IAM list keys", e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: ListKeysResponse = response
            .json()
            .await
            .map_err(|e| transport_error("IAM list keys response", e))?;
        Ok(body.keys)
    }

    async fn create_key(&self, sa: &ServiceAccount) -> Result<NewKey, UpstreamError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .post(self.keys_url(sa))
            .bearer_auth(token)
            .json(&CreateKeyRequest {
                private_key_type: CREDENTIALS_FILE_KEY_TYPE,
            })
            .send()
            .await
            .map_err(|e| transport_error("IAM create key", e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: CreateKeyResponse = response
            .json()
            .await
            .map_err(|e| transport_error("IAM create key response", e))?;
        Ok(NewKey {
            name: body.name,
            private_key_data: body.private_key_data,
        })
    }

    async fn delete_key(&self, key_name: &str) -> Result<(), UpstreamError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .client
            .delete(format!("{}/{}", self.base_url, key_name))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_error("IAM delete key", e))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::gcp::auth::StaticTokenSource;
    use mockito::{Matcher, Server};

    const SA_KEYS_PATH: &str = "/projects/-/serviceAccounts/app@proj.iam.gserviceaccount.com/keys";

    fn client(server: &Server) -> IamRestClient {
        IamRestClient::new(
            server.url(),
            Arc::new(StaticTokenSource::new("test-token")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn sa() -> ServiceAccount {
        ServiceAccount::parse("app@proj.iam.gserviceaccount.com").unwrap()
    }

    #[tokio::test]
    async fn test_list_keys() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", SA_KEYS_PATH)
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"keys":[
                    {"name":"projects/proj/serviceAccounts/app@proj.iam.gserviceaccount.com/keys/aaa",
                     "validAfterTime":"2020-04-12T04:44:38Z","validBeforeTime":"9999-12-31T23:59:59Z",
                     "keyAlgorithm":"KEY_ALG_RSA_2048","keyOrigin":"GOOGLE_PROVIDED","keyType":"USER_MANAGED"},
                    {"name":"projects/proj/serviceAccounts/app@proj.iam.gserviceaccount.com/keys/bbb",
                     "validAfterTime":"2020-04-12T04:44:38Z","keyType":"SYSTEM_MANAGED"}
                ]}"#,
            )
            .create_async()
            .await;

        let keys = client(&server).list_keys(&sa()).await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].is_user_managed());
        assert_eq!(keys[1].key_id(), "bbb");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_keys_empty_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", SA_KEYS_PATH)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        assert!(client(&server).list_keys(&sa()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_key_requests_credentials_file() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", SA_KEYS_PATH)
            .match_body(Matcher::Json(serde_json::json!({
                "privateKeyType": "TYPE_GOOGLE_CREDENTIALS_FILE"
            })))
            .with_status(200)
            .with_body(
                r#"{"name":"projects/proj/serviceAccounts/app@proj.iam.gserviceaccount.com/keys/ccc",
                    "privateKeyType":"TYPE_GOOGLE_CREDENTIALS_FILE","privateKeyData":"e30=",
                    "keyType":"USER_MANAGED"}"#,
            )
            .create_async()
            .await;

        let key = client(&server).create_key(&sa()).await.unwrap();
        assert!(key.name.ends_with("/keys/ccc"));
        assert_eq!(key.private_key_data, "e30=");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_account_maps_to_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", SA_KEYS_PATH)
            .with_status(404)
            .with_body(
                r#"{"error":{"code":404,"message":"Unknown service account","status":"NOT_FOUND"}}"#,
            )
            .create_async()
            .await;

        let err = client(&server).create_key(&sa()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message, "NOT_FOUND: Unknown service account");
    }

    #[tokio::test]
    async fn test_delete_key() {
        let mut server = Server::new_async().await;
        let name = "projects/proj/serviceAccounts/app@proj.iam.gserviceaccount.com/keys/ddd";
        let mock = server
            .mock("DELETE", format!("/{}", name).as_str())
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("DELETE", Matcher::Regex("/keys/eee$".into()))
            .with_status(403)
            .with_body(r#"{"error":{"code":403,"message":"Permission denied","status":"PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let iam = client(&server);
        iam.delete_key(name).await.unwrap();
        mock.assert_async().await;

        let err = iam
            .delete_key("projects/proj/serviceAccounts/app@proj.iam.gserviceaccount.com/keys/eee")
            .await
            .unwrap_err();
        assert_eq!(err.status, 403);
    }

    #[tokio::test]
    async fn test_transport_failure_is_500() {
        let iam = IamRestClient::new(
            "http://127.0.0.1:1",
            Arc::new(StaticTokenSource::new("t")),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = iam.list_keys(&sa()).await.unwrap_err();
        assert_eq!(err.status, 500);
    }
}
