//! Search index integration: document normalization, batch upload, and recovery.

mod client;
mod types;
mod writer;

pub use client::SearchIndexClient;
pub use types::{DocumentStatus, IndexDocument, IndexError};
pub use writer::{IndexWriter, SearchIndexApi};
