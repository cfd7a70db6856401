//! Staged ingestion pipeline: storage, extraction, analysis, and indexing.

pub mod extract;
mod service;
mod types;

pub use service::{IngestApi, IngestService};
pub use types::{PipelineError, RawUpload};
