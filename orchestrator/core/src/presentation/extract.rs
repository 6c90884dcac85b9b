// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Body extractors whose rejections are [`KeyOpsError::Validation`].
//!
//! A missing or empty body reads as "no fields", so the handler reports the
//! missing field itself. Form endpoints take urlencoded and multipart bodies.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::domain::error::KeyOpsError;

/// Form fields from `application/x-www-form-urlencoded` or `multipart/form-data`.
#[derive(Debug)]
pub struct FormFields<T>(pub T);

impl<T, S> FromRequest<S> for FormFields<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = KeyOpsError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type {
            Some(ct) if ct.starts_with("multipart/form-data") => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(rejected)?;
                multipart_fields(multipart).await.map(Self)
            }
            Some(_) => Form::<T>::from_request(req, state)
                .await
                .map(|Form(value)| Self(value))
                .map_err(rejected),
            None => {
                let bytes = Bytes::from_request(req, state).await.map_err(rejected)?;
                if !is_blank(&bytes) {
                    return Err(KeyOpsError::validation(
                        "form body needs Content-Type application/x-www-form-urlencoded or multipart/form-data",
                    ));
                }
                from_fields(Map::new()).map(Self)
            }
        }
    }
}

/// A JSON body; an absent or blank body is read as `{}`.
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = KeyOpsError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state).await.map_err(rejected)?;
        if is_blank(&bytes) {
            return from_fields(Map::new()).map(Self);
        }
        Json::<T>::from_bytes(&bytes)
            .map(|Json(value)| Self(value))
            .map_err(rejected)
    }
}

async fn multipart_fields<T: DeserializeOwned>(mut multipart: Multipart) -> Result<T, KeyOpsError> {
    let mut fields = Map::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| KeyOpsError::validation(format!("invalid multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let text = field.text().await.map_err(|e| {
            KeyOpsError::validation(format!("invalid multipart field '{}': {}", name, e))
        })?;
        fields.insert(name, Value::String(text));
    }
    from_fields(fields)
}

fn from_fields<T: DeserializeOwned>(fields: Map<String, Value>) -> Result<T, KeyOpsError> {
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| KeyOpsError::validation(format!("invalid request body: {}", e)))
}

fn is_blank(bytes: &Bytes) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn rejected(rejection: impl std::fmt::Display) -> KeyOpsError {
    KeyOpsError::validation(rejection.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Fields {
        #[serde(default)]
        name: Option<String>,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder().method("PUT").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_blank_body_has_no_fields() {
        let FormFields(form) = FormFields::<Fields>::from_request(request(None, ""), &())
            .await
            .unwrap();
        assert!(form.name.is_none());

        let JsonBody(json) = JsonBody::<Fields>::from_request(request(None, " \n"), &())
            .await
            .unwrap();
        assert!(json.name.is_none());
    }

    #[tokio::test]
    async fn test_multipart_fields_are_read() {
        let body = "--XB\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nvalue\r\n--XB--\r\n";
        let FormFields(form) = FormFields::<Fields>::from_request(
            request(Some("multipart/form-data; boundary=XB"), body),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(form.name.as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_rejections_are_validation_errors() {
        let err = FormFields::<Fields>::from_request(request(Some("text/plain"), "name=x"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = FormFields::<Fields>::from_request(request(None, "name=x"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);

        let err = JsonBody::<Fields>::from_request(request(Some("application/json"), "{nope"), &())
            .await
            .unwrap_err();
        assert!(matches!(err, KeyOpsError::Validation(_)));
    }
}
