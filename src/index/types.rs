//! Shared types used by the search index client and writer.

use crate::analyze::Chunk;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while interacting with the search service.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Base URL failed to parse or normalize.
    #[error("invalid search endpoint: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The target index does not exist on the service.
    #[error("search index '{index}' was not found")]
    IndexNotFound {
        /// Name of the missing index.
        index: String,
    },
    /// Service responded with an unexpected status code.
    #[error("unexpected search response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Per-document outcome reported by the service for a batch upload.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentStatus {
    /// Document key echoed back by the service.
    pub key: String,
    /// Whether the service accepted the document.
    #[serde(rename = "status")]
    pub succeeded: bool,
    /// Diagnostic message for rejected documents.
    #[serde(default, rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// Normalized projection of a [`Chunk`] plus its embedding vector; the unit of batch upload.
///
/// Every field already passed through the chunk coercion boundary, so serialization here
/// is a direct mapping with no runtime shape checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDocument {
    /// Document key.
    pub id: String,
    /// Embedding of the summary-plus-content input.
    #[serde(rename = "content_vector")]
    pub content_vector: Vec<f32>,
    /// Primary chunk body.
    pub content: String,
    /// Document-level summary.
    pub parent_summary: String,
    /// Chunk-level summary.
    pub chunk_summary: String,
    /// Narrative code explanation.
    pub code_explanation: String,
    /// Captured design intent.
    pub design_intent: String,
    /// Handover notes.
    pub handover_notes: String,
    /// Comment strings from the source.
    pub code_comments: Vec<String>,
    /// Indexing timestamp, RFC3339.
    pub processed_date: String,
    /// PARA-style category label.
    pub para_category: String,
    /// Source file type label.
    pub file_type: String,
    /// Programming or natural language.
    pub language: String,
    /// Framework association.
    pub framework: String,
    /// Service-domain tag.
    pub service_domain: String,
    /// Whether the source is archived material.
    pub is_archived: bool,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Related document sections.
    pub related_section: Vec<String>,
    /// Parent identifier grouping sibling chunks.
    pub parent_id: String,
    /// Source file name.
    pub file_name: String,
    /// Source file path.
    pub file_path: String,
    /// Origin URL of the stored payload.
    pub url: String,
    /// Opaque serialized chunk metadata.
    pub chunk_meta: String,
    /// Opaque serialized code metadata.
    pub code_metadata: String,
    /// Opaque serialized people list.
    pub involved_people: String,
    /// Raw code body.
    pub raw_code: String,
    /// Related file list.
    pub related_files: Vec<String>,
}

impl IndexDocument {
    /// Project a coerced chunk into an index document.
    ///
    /// `now` supplies the `processedDate` when the chunk did not carry one.
    pub fn from_chunk(chunk: &Chunk, content_vector: Vec<f32>, now: &str) -> Self {
        Self {
            id: chunk.id.clone(),
            content_vector,
            content: chunk.content.clone(),
            parent_summary: chunk.parent_summary.clone(),
            chunk_summary: chunk.chunk_summary.clone(),
            code_explanation: chunk.code_explanation.clone(),
            design_intent: chunk.design_intent.clone(),
            handover_notes: chunk.handover_notes.clone(),
            code_comments: chunk.code_comments.clone(),
            processed_date: chunk
                .processed_date
                .clone()
                .unwrap_or_else(|| now.to_string()),
            para_category: chunk.para_category.clone(),
            file_type: chunk.file_type.clone(),
            language: chunk.language.clone(),
            framework: chunk.framework.clone(),
            service_domain: chunk.service_domain.clone(),
            is_archived: chunk.is_archived,
            tags: chunk.tags.clone(),
            related_section: chunk.related_section.clone(),
            parent_id: chunk.parent_id.clone(),
            file_name: chunk.file_name.clone(),
            file_path: chunk.file_path.clone(),
            url: chunk.url.clone(),
            chunk_meta: chunk.chunk_meta.clone(),
            code_metadata: chunk.code_metadata.clone(),
            involved_people: chunk.involved_people.clone(),
            raw_code: chunk.raw_code.clone(),
            related_files: chunk.related_files.clone(),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub(crate) value: Vec<DocumentStatus>,
}
