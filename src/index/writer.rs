//! Index writer: embeds chunk batches, normalizes them into documents, and uploads them
//! with a single bounded recovery path for a missing destination index.

use crate::analyze::Chunk;
use crate::config::get_config;
use crate::embedding::EmbeddingClient;
use crate::index::types::{DocumentStatus, IndexDocument, IndexError};
use async_trait::async_trait;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;

/// Search service operations the writer depends on.
#[async_trait]
pub trait SearchIndexApi: Send + Sync {
    /// Upload a batch of documents, returning the per-document report.
    async fn upload_documents(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<Vec<DocumentStatus>, IndexError>;

    /// Create the index when it is missing; idempotent.
    async fn ensure_index(&self, index: &str) -> Result<(), IndexError>;
}

/// Batches coerced chunks into index documents and executes the upload protocol.
pub struct IndexWriter {
    search: Arc<dyn SearchIndexApi>,
    embedder: Arc<dyn EmbeddingClient>,
}

impl IndexWriter {
    /// Build a writer over a search backend and an embedding backend.
    pub fn new(search: Arc<dyn SearchIndexApi>, embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self { search, embedder }
    }

    /// Embed, normalize, and upload a chunk batch to `index_name`.
    ///
    /// Returns the number of documents the destination confirmed succeeded. Per-chunk
    /// embedding failures and per-document rejections are logged and skipped; only a
    /// destination-level failure propagates. When the upload fails because the index is
    /// missing, the index is created and the same batch retried exactly once.
    pub async fn write(&self, chunks: &[Chunk], index_name: &str) -> Result<usize, IndexError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let expected_dimension = get_config().embedding_dimension;
        let now = time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .expect("RFC3339 formatting of current time");

        let mut documents = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding_input = format!(
                "Document summary: {}\n\nChunk body: {}",
                chunk.parent_summary, chunk.content
            );
            let vector = match self.embedder.embed(&embedding_input).await {
                Ok(vector) => vector,
                Err(error) => {
                    tracing::warn!(chunk = %chunk.id, %error, "Embedding failed; chunk skipped");
                    continue;
                }
            };
            if vector.len() != expected_dimension {
                tracing::warn!(
                    chunk = %chunk.id,
                    expected = expected_dimension,
                    actual = vector.len(),
                    "Embedding dimension mismatch; chunk skipped"
                );
                continue;
            }
            documents.push(IndexDocument::from_chunk(chunk, vector, &now));
        }

        if documents.is_empty() {
            tracing::warn!(
                index = index_name,
                "No chunks survived embedding; nothing uploaded"
            );
            return Ok(0);
        }

        let report = match self.search.upload_documents(index_name, &documents).await {
            Ok(report) => report,
            Err(IndexError::IndexNotFound { index }) => {
                tracing::warn!(index = %index, "Index missing; creating and retrying upload once");
                self.search.ensure_index(&index).await?;
                self.search.upload_documents(&index, &documents).await?
            }
            Err(error) => return Err(error),
        };

        let succeeded = report.iter().filter(|status| status.succeeded).count();
        for status in report.iter().filter(|status| !status.succeeded) {
            tracing::warn!(
                index = index_name,
                key = %status.key,
                error = status.error_message.as_deref().unwrap_or("unknown"),
                "Document rejected by search service"
            );
        }
        tracing::info!(
            index = index_name,
            attempted = documents.len(),
            succeeded,
            "Index batch written"
        );
        Ok(succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_support::ensure_test_config;
    use crate::embedding::EmbeddingClientError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embedder producing 4-dimension vectors, failing for marked inputs.
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            if text.contains("poison") {
                return Err(EmbeddingClientError::GenerationFailed("boom".into()));
            }
            Ok(vec![0.1, 0.2, 0.3, 0.4])
        }
    }

    /// Scripted search backend: optionally fails the first N uploads with a missing
    /// index, then reports success for every document.
    struct StubSearch {
        missing_uploads: AtomicUsize,
        ensure_calls: AtomicUsize,
        upload_calls: AtomicUsize,
        rejected_keys: Mutex<Vec<String>>,
    }

    impl StubSearch {
        fn new(missing_uploads: usize) -> Arc<Self> {
            Arc::new(Self {
                missing_uploads: AtomicUsize::new(missing_uploads),
                ensure_calls: AtomicUsize::new(0),
                upload_calls: AtomicUsize::new(0),
                rejected_keys: Mutex::new(Vec::new()),
            })
        }

        fn reject(self: &Arc<Self>, key: &str) {
            self.rejected_keys
                .lock()
                .expect("rejected keys lock")
                .push(key.to_string());
        }
    }

    #[async_trait]
    impl SearchIndexApi for StubSearch {
        async fn upload_documents(
            &self,
            index: &str,
            documents: &[IndexDocument],
        ) -> Result<Vec<DocumentStatus>, IndexError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            if self
                .missing_uploads
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                    remaining.checked_sub(1)
                })
                .is_ok()
            {
                return Err(IndexError::IndexNotFound {
                    index: index.to_string(),
                });
            }

            let rejected = self.rejected_keys.lock().expect("rejected keys lock");
            Ok(documents
                .iter()
                .map(|doc| DocumentStatus {
                    key: doc.id.clone(),
                    succeeded: !rejected.contains(&doc.id),
                    error_message: rejected.contains(&doc.id).then(|| "too large".to_string()),
                })
                .collect())
        }

        async fn ensure_index(&self, _index: &str) -> Result<(), IndexError> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            id: id.into(),
            content: content.into(),
            ..Chunk::default()
        }
    }

    #[tokio::test]
    async fn empty_batch_short_circuits() {
        ensure_test_config();
        let search = StubSearch::new(0);
        let writer = IndexWriter::new(search.clone(), Arc::new(StubEmbedder));

        let count = writer.write(&[], "docs").await.expect("write");
        assert_eq!(count, 0);
        assert_eq!(search.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_embeddings_are_skipped_not_fatal() {
        ensure_test_config();
        let search = StubSearch::new(0);
        let writer = IndexWriter::new(search.clone(), Arc::new(StubEmbedder));

        let chunks = [
            chunk("good-1", "first"),
            chunk("bad-1", "poison pill"),
            chunk("good-2", "second"),
        ];
        let count = writer.write(&chunks, "docs").await.expect("write");

        assert_eq!(count, 2);
        assert_eq!(search.upload_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_embeddings_failing_skips_the_destination() {
        ensure_test_config();
        let search = StubSearch::new(0);
        let writer = IndexWriter::new(search.clone(), Arc::new(StubEmbedder));

        let count = writer
            .write(&[chunk("bad-1", "poison")], "docs")
            .await
            .expect("write");
        assert_eq!(count, 0);
        assert_eq!(search.upload_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_index_creates_once_and_retries_once() {
        ensure_test_config();
        let search = StubSearch::new(1);
        let writer = IndexWriter::new(search.clone(), Arc::new(StubEmbedder));

        let count = writer
            .write(&[chunk("c-1", "body")], "fresh")
            .await
            .expect("write");

        assert_eq!(count, 1);
        assert_eq!(search.ensure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(search.upload_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistently_missing_index_fails_after_one_retry() {
        ensure_test_config();
        let search = StubSearch::new(2);
        let writer = IndexWriter::new(search.clone(), Arc::new(StubEmbedder));

        let result = writer.write(&[chunk("c-1", "body")], "ghost").await;

        assert!(matches!(result, Err(IndexError::IndexNotFound { .. })));
        assert_eq!(search.ensure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(search.upload_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn partial_rejection_returns_confirmed_count() {
        ensure_test_config();
        let search = StubSearch::new(0);
        search.reject("c-2");
        let writer = IndexWriter::new(search.clone(), Arc::new(StubEmbedder));

        let count = writer
            .write(&[chunk("c-1", "a"), chunk("c-2", "b")], "docs")
            .await
            .expect("write");
        assert_eq!(count, 1);
    }
}
