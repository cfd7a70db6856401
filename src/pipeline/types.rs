//! Core data types and error definitions for the ingestion pipeline.

use crate::analyze::AnalysisError;
use crate::blob::BlobError;
use crate::extraction::ExtractionError;
use crate::index::IndexError;
use crate::pipeline::extract::ExtractError;
use thiserror::Error;

/// One uploaded payload handed to the pipeline.
///
/// Transient: lives for the duration of a single pipeline run. The original file name is
/// untrusted and never used for storage names; only the derived extension drives stage
/// dispatch.
#[derive(Debug, Clone)]
pub struct RawUpload {
    /// Original file name as supplied by the client.
    pub file_name: String,
    /// Lower-cased extension derived from the file name; empty when absent.
    pub file_extension: String,
    /// Raw file bytes.
    pub payload: Vec<u8>,
    /// Optional logical destination index; `None` means the configured default.
    pub target_index: Option<String>,
}

impl RawUpload {
    /// Build an upload, deriving the lower-cased extension from the file name.
    pub fn new(file_name: impl Into<String>, payload: Vec<u8>, target_index: Option<String>) -> Self {
        let file_name = file_name.into();
        let file_extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        Self {
            file_name,
            file_extension,
            payload,
            target_index,
        }
    }
}

/// Errors emitted by pipeline stages; each maps to a terminal `failed` task update.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Raw payload could not be stored.
    #[error("Blob upload failed: {0}")]
    Blob(#[from] BlobError),
    /// Remote text extraction failed.
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// Local DOCX extraction failed.
    #[error("DOCX extraction failed: {0}")]
    LocalExtraction(#[from] ExtractError),
    /// Extraction produced no usable text.
    #[error("No text extracted from file.")]
    EmptyText,
    /// Chunk generation failed outright.
    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),
    /// Chunk generation returned an empty chunk list.
    #[error("Analysis produced no chunks.")]
    NoChunks,
    /// Index writer reported a fatal error.
    #[error("Indexing failed: {0}")]
    Index(#[from] IndexError),
}

impl PipelineError {
    /// Client-facing failure message; operator detail stays in logs.
    pub fn task_message(&self) -> String {
        match self {
            Self::EmptyText => "No text extracted from file.".to_string(),
            Self::NoChunks => "Analysis produced no chunks.".to_string(),
            other => other.to_string(),
        }
    }
}
