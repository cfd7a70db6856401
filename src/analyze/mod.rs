//! Structured-chunk generation: language-model analysis of extracted text.

mod chunk;
mod client;

pub use chunk::{Chunk, ChunkContext};
pub use client::AnalysisClient;

use crate::pipeline::extract::SourceKind;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the chunk generation collaborator.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service responded with an unexpected status code.
    #[error("unexpected analysis response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the service.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// The model reply could not be parsed into a chunk list.
    #[error("malformed analysis reply: {0}")]
    MalformedReply(String),
}

/// Interface to the structured-chunk generation collaborator.
#[async_trait]
pub trait ChunkAnalyzer: Send + Sync {
    /// Turn extracted text into a list of typed chunks.
    ///
    /// `context` supplies identity defaults (parent id, file name) applied to every
    /// chunk the model omits them for.
    async fn analyze(
        &self,
        text: &str,
        kind: SourceKind,
        context: &ChunkContext,
    ) -> Result<Vec<Chunk>, AnalysisError>;
}
