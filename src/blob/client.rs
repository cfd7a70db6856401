//! HTTP client for the blob storage collaborator.

use crate::blob::{AccessHandle, BlobError, BlobStore};
use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;

/// Lightweight HTTP client for blob operations.
///
/// Speaks the flat `PUT {endpoint}/{container}/{name}` block-blob protocol. Read access
/// handles carry the configured SAS token so downstream services can fetch the payload
/// without credential sharing.
pub struct BlobClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) sas_token: Option<String>,
}

impl BlobClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, BlobError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("docpipe/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let base_url = normalize_base_url(&config.blob_endpoint)?;
        tracing::debug!(url = %base_url, "Initialized blob HTTP client");

        Ok(Self {
            client,
            base_url,
            sas_token: config.blob_sas_token.clone(),
        })
    }

    /// Create the container when it is missing; idempotent on conflict.
    async fn ensure_container(&self, container: &str) -> Result<(), BlobError> {
        let url = self.endpoint(&format!("{container}?restype=container"));
        let response = self.client.request(Method::PUT, url).send().await?;

        match response.status() {
            status if status.is_success() => {
                tracing::debug!(container, "Container created");
                Ok(())
            }
            StatusCode::CONFLICT => {
                tracing::debug!(container, "Container already exists");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(BlobError::UnexpectedStatus { status, body })
            }
        }
    }

    async fn put_once(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<StatusCode, BlobError> {
        let url = self.endpoint(&format!("{container}/{name}"));
        let response = self
            .client
            .request(Method::PUT, url)
            .header("x-ms-blob-type", "BlockBlob")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(status)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(BlobError::UnexpectedStatus { status, body })
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let mut url = format!("{base}/{path}");
        if let Some(sas) = &self.sas_token
            && !sas.is_empty()
        {
            let separator = if path.contains('?') { '&' } else { '?' };
            url.push(separator);
            url.push_str(sas.trim_start_matches('?'));
        }
        url
    }
}

#[async_trait]
impl BlobStore for BlobClient {
    async fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        container_hint: &str,
    ) -> Result<AccessHandle, BlobError> {
        let status = self
            .put_once(container_hint, name, bytes.clone())
            .await?;

        if status == StatusCode::NOT_FOUND {
            // Container absent: create it transparently and retry the blob once.
            self.ensure_container(container_hint).await?;
            let retry_status = self.put_once(container_hint, name, bytes).await?;
            if retry_status == StatusCode::NOT_FOUND {
                return Err(BlobError::UnexpectedStatus {
                    status: retry_status,
                    body: format!("container '{container_hint}' still missing after create"),
                });
            }
        }

        tracing::debug!(container = container_hint, blob = name, "Blob stored");
        Ok(AccessHandle {
            url: self.endpoint(&format!("{container_hint}/{name}")),
        })
    }
}

fn normalize_base_url(url: &str) -> Result<String, BlobError> {
    let mut parsed =
        reqwest::Url::parse(url).map_err(|err| BlobError::InvalidUrl(err.to_string()))?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::PUT, MockServer};

    fn test_client(server: &MockServer, sas_token: Option<&str>) -> BlobClient {
        BlobClient {
            client: Client::builder()
                .user_agent("docpipe-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            sas_token: sas_token.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn put_uploads_block_blob() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/docs-raw/task-1.txt")
                    .header("x-ms-blob-type", "BlockBlob");
                then.status(201);
            })
            .await;

        let client = test_client(&server, None);
        let handle = client
            .put("task-1.txt", b"hello".to_vec(), "docs-raw")
            .await
            .expect("upload");

        mock.assert();
        assert!(handle.url.ends_with("/docs-raw/task-1.txt"));
    }

    #[tokio::test]
    async fn missing_container_is_created_then_retried() {
        let server = MockServer::start_async().await;
        let blob_missing = server
            .mock_async(|when, then| {
                when.method(PUT).path("/docs-raw/task-1.txt");
                then.status(404);
            })
            .await;
        let create_container = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/docs-raw")
                    .query_param("restype", "container");
                then.status(201);
            })
            .await;

        let client = test_client(&server, None);
        // First blob PUT returns 404 twice in this mock setup, so the retry surfaces
        // the persistent failure instead of looping.
        let result = client.put("task-1.txt", b"hello".to_vec(), "docs-raw").await;

        create_container.assert();
        assert_eq!(blob_missing.hits(), 2);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn sas_token_is_appended_to_handles() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/docs-raw/task-1.txt");
                then.status(201);
            })
            .await;

        let client = test_client(&server, Some("sv=2024&sig=abc"));
        let handle = client
            .put("task-1.txt", b"hello".to_vec(), "docs-raw")
            .await
            .expect("upload");

        assert!(handle.url.contains("task-1.txt?sv=2024&sig=abc"));
    }
}
