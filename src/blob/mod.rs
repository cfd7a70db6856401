//! Object storage integration: raw payloads and processed chunk archives.

mod client;

pub use client::BlobClient;

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned while interacting with blob storage.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Base URL failed to parse or normalize.
    #[error("invalid blob endpoint: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Storage responded with an unexpected status code.
    #[error("unexpected blob response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from storage.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Time-bounded read reference to a stored blob, consumable by downstream services.
#[derive(Debug, Clone)]
pub struct AccessHandle {
    /// Full URL, including any access token query, granting read access.
    pub url: String,
}

/// Interface to the object storage collaborator.
///
/// `container_hint` selects the logical destination; the store creates the container
/// transparently when it is absent.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes under `name` and return a read handle for downstream services.
    async fn put(
        &self,
        name: &str,
        bytes: Vec<u8>,
        container_hint: &str,
    ) -> Result<AccessHandle, BlobError>;
}

/// Derive the container name for a target index, applying storage naming rules.
///
/// Container names must be lowercase with hyphens; underscores and spaces in caller
/// supplied index names are normalized away.
pub fn container_for_index(target_index: Option<&str>, suffix: &str, default: &str) -> String {
    match target_index {
        Some(index) => {
            let safe = index.to_lowercase().replace(['_', ' '], "-");
            format!("{safe}-{suffix}")
        }
        None => default.to_string(),
    }
}
