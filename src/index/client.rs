//! HTTP client wrapper for the search service's document and index-admin APIs.

use crate::config::get_config;
use crate::index::types::{DocumentStatus, IndexDocument, IndexError, UploadResponse};
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

const API_VERSION: &str = "2023-11-01";

/// Lightweight HTTP client for search index operations.
pub struct SearchIndexClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
}

impl SearchIndexClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, IndexError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("docpipe/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let base_url = normalize_base_url(&config.search_endpoint)?;
        tracing::debug!(
            url = %base_url,
            has_api_key = %config
                .search_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized search HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.search_api_key.clone(),
        })
    }

    /// Build a client against an explicit endpoint; used by integration tests.
    pub fn from_parts(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    /// Upload a batch of documents, returning the service's per-document report.
    ///
    /// A missing target index surfaces as [`IndexError::IndexNotFound`] so the writer can
    /// run its create-and-retry recovery.
    pub async fn upload_documents(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<Vec<DocumentStatus>, IndexError> {
        let actions: Vec<Value> = documents
            .iter()
            .map(|doc| {
                let mut value = serde_json::to_value(doc).expect("document serializes to object");
                value
                    .as_object_mut()
                    .expect("document serializes to object")
                    .insert("@search.action".into(), Value::String("mergeOrUpload".into()));
                value
            })
            .collect();

        let response = self
            .request(Method::POST, &format!("indexes/{index}/docs/index"))
            .json(&json!({ "value": actions }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let payload: UploadResponse = response.json().await?;
                tracing::debug!(index, documents = payload.value.len(), "Batch uploaded");
                Ok(payload.value)
            }
            StatusCode::NOT_FOUND => Err(IndexError::IndexNotFound {
                index: index.to_string(),
            }),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::error!(index, error = %error, "Batch upload failed");
                Err(error)
            }
        }
    }

    /// Create the index when it is missing from the service; idempotent.
    pub async fn ensure_index(&self, index: &str) -> Result<(), IndexError> {
        if self.index_exists(index).await? {
            return Ok(());
        }

        tracing::info!(index, "Creating search index");
        self.create_index(index).await
    }

    async fn index_exists(&self, index: &str) -> Result<bool, IndexError> {
        let response = self
            .request(Method::GET, &format!("indexes/{index}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = IndexError::UnexpectedStatus { status, body };
                tracing::error!(index, error = %error, "Index existence check failed");
                Err(error)
            }
        }
    }

    async fn create_index(&self, index: &str) -> Result<(), IndexError> {
        let dimension = get_config().embedding_dimension;
        let response = self
            .request(Method::PUT, &format!("indexes/{index}"))
            .json(&index_schema(index, dimension))
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(index, "Search index created");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = IndexError::UnexpectedStatus { status, body };
            tracing::error!(index, error = %error, "Index creation failed");
            Err(error)
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{base}/{path}?api-version={API_VERSION}");
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }
}

/// Index definition used when the destination has to be created on the fly.
///
/// Mirrors the document shape: one vector field sized to the embedding dimension, the
/// searchable narrative fields, and filterable metadata.
fn index_schema(name: &str, dimension: usize) -> Value {
    let searchable = |field: &str| {
        json!({ "name": field, "type": "Edm.String", "searchable": true })
    };
    let filterable = |field: &str| {
        json!({ "name": field, "type": "Edm.String", "searchable": true, "filterable": true, "facetable": true })
    };
    let plain = |field: &str| json!({ "name": field, "type": "Edm.String" });
    let string_collection = |field: &str, is_searchable: bool| {
        json!({ "name": field, "type": "Collection(Edm.String)", "searchable": is_searchable })
    };

    json!({
        "name": name,
        "fields": [
            { "name": "id", "type": "Edm.String", "key": true, "filterable": true },
            {
                "name": "content_vector",
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "dimensions": dimension,
                "vectorSearchProfile": "vector-profile"
            },
            searchable("content"),
            searchable("parentSummary"),
            searchable("chunkSummary"),
            searchable("codeExplanation"),
            searchable("designIntent"),
            searchable("handoverNotes"),
            string_collection("codeComments", true),
            { "name": "processedDate", "type": "Edm.DateTimeOffset", "sortable": true, "filterable": true },
            filterable("paraCategory"),
            filterable("fileType"),
            filterable("language"),
            filterable("framework"),
            filterable("serviceDomain"),
            { "name": "isArchived", "type": "Edm.Boolean", "filterable": true, "facetable": true },
            string_collection("tags", true),
            string_collection("relatedSection", true),
            { "name": "parentId", "type": "Edm.String", "filterable": true },
            searchable("fileName"),
            searchable("filePath"),
            plain("url"),
            plain("chunkMeta"),
            plain("codeMetadata"),
            plain("involvedPeople"),
            plain("rawCode"),
            string_collection("relatedFiles", false),
        ],
        "vectorSearch": {
            "algorithms": [ { "name": "hnsw-default", "kind": "hnsw" } ],
            "profiles": [ { "name": "vector-profile", "algorithm": "hnsw-default" } ]
        }
    })
}

#[async_trait::async_trait]
impl crate::index::writer::SearchIndexApi for SearchIndexClient {
    async fn upload_documents(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<Vec<DocumentStatus>, IndexError> {
        SearchIndexClient::upload_documents(self, index, documents).await
    }

    async fn ensure_index(&self, index: &str) -> Result<(), IndexError> {
        SearchIndexClient::ensure_index(self, index).await
    }
}

fn normalize_base_url(url: &str) -> Result<String, IndexError> {
    let mut parsed =
        reqwest::Url::parse(url).map_err(|err| IndexError::InvalidUrl(err.to_string()))?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}
