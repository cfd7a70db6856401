//! Ingestion gateway: accepts uploads, spawns pipeline runs, and reports task state.
//!
//! A submitted upload is acknowledged immediately with a task id; the staged run executes
//! on a background task and publishes its progress through the shared [`TaskRegistry`].
//! Stage errors never cross the gateway boundary as panics or hung tasks: every failure
//! collapses into exactly one terminal `failed` record.

use crate::analyze::{Chunk, ChunkAnalyzer, ChunkContext};
use crate::blob::{BlobStore, container_for_index};
use crate::config::get_config;
use crate::extraction::DocumentExtractor;
use crate::index::IndexWriter;
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::pipeline::extract::{
    classify, decode_text_bytes, extract_docx, is_local_document, is_plain_text,
};
use crate::pipeline::types::{PipelineError, RawUpload};
use crate::tasks::{TaskError, TaskRegistry, TaskSnapshot, TaskStatus, TaskUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Operations exposed to the HTTP layer.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Accept an upload, returning the id of the task tracking its pipeline run.
    async fn submit(&self, upload: RawUpload) -> Result<String, TaskError>;

    /// Current state of a task, if the id is known.
    fn task_snapshot(&self, task_id: &str) -> Option<TaskSnapshot>;

    /// Current ingestion counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Concrete pipeline service wiring the stage collaborators together.
#[derive(Clone)]
pub struct IngestService {
    registry: Arc<TaskRegistry>,
    store: Arc<dyn BlobStore>,
    extractor: Arc<dyn DocumentExtractor>,
    analyzer: Arc<dyn ChunkAnalyzer>,
    writer: Arc<IndexWriter>,
    metrics: Arc<IngestMetrics>,
}

impl IngestService {
    /// Assemble the service from its stage collaborators.
    pub fn new(
        registry: Arc<TaskRegistry>,
        store: Arc<dyn BlobStore>,
        extractor: Arc<dyn DocumentExtractor>,
        analyzer: Arc<dyn ChunkAnalyzer>,
        writer: Arc<IndexWriter>,
        metrics: Arc<IngestMetrics>,
    ) -> Self {
        Self {
            registry,
            store,
            extractor,
            analyzer,
            writer,
            metrics,
        }
    }

    /// Execute the staged pipeline for one upload, publishing the terminal outcome.
    pub(crate) async fn run(&self, task_id: String, upload: RawUpload) {
        match self.run_stages(&task_id, &upload).await {
            Ok(indexed) if indexed > 0 => {
                self.metrics.record_completed(indexed as u64);
                self.registry.update(
                    &task_id,
                    TaskUpdate {
                        status: Some(TaskStatus::Completed),
                        progress: Some(100),
                        message: Some("Upload & indexing complete!".to_string()),
                    },
                );
                tracing::info!(task = %task_id, indexed, "Ingestion completed");
            }
            Ok(_) => {
                self.metrics.record_completed(0);
                self.registry.update(
                    &task_id,
                    TaskUpdate {
                        status: Some(TaskStatus::CompletedWithWarning),
                        progress: Some(100),
                        message: Some("Finished, but no documents indexed.".to_string()),
                    },
                );
                tracing::warn!(task = %task_id, "Ingestion finished without indexing anything");
            }
            Err(error) => {
                self.metrics.record_failed();
                tracing::error!(task = %task_id, %error, "Ingestion failed");
                self.registry
                    .update(&task_id, TaskUpdate::failed(error.task_message()));
            }
        }
    }

    /// The stage sequence proper; any error aborts the run at its boundary.
    async fn run_stages(
        &self,
        task_id: &str,
        upload: &RawUpload,
    ) -> Result<usize, PipelineError> {
        let config = get_config();

        // Stage 1: persist the raw payload under a storage-safe name.
        self.registry.update(
            task_id,
            TaskUpdate::processing(10, format!("Uploading raw file: {}", upload.file_name)),
        );
        let blob_name = if upload.file_extension.is_empty() {
            task_id.to_string()
        } else {
            format!("{task_id}.{}", upload.file_extension)
        };
        let raw_container = container_for_index(
            upload.target_index.as_deref(),
            "raw",
            &config.blob_raw_container,
        );
        let handle = self
            .store
            .put(&blob_name, upload.payload.clone(), &raw_container)
            .await?;

        // Stage 2: get plain text, locally when the format allows it.
        self.registry
            .update(task_id, TaskUpdate::processing(30, "Extracting text..."));
        let text = if is_plain_text(&upload.file_extension) {
            decode_text_bytes(&upload.payload)
        } else if is_local_document(&upload.file_extension) {
            extract_docx(&upload.payload)?
        } else {
            self.extractor.extract(&handle.url).await?
        };
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyText);
        }

        // Stage 3: structured chunk generation.
        self.registry
            .update(task_id, TaskUpdate::processing(50, "Analyzing document..."));
        let context = ChunkContext {
            parent_id: task_id.to_string(),
            file_name: upload.file_name.clone(),
        };
        let kind = classify(&upload.file_extension);
        let chunks = self.analyzer.analyze(&text, kind, &context).await?;
        if chunks.is_empty() {
            return Err(PipelineError::NoChunks);
        }
        tracing::debug!(task = task_id, chunks = chunks.len(), "Analysis produced chunks");

        // Stage 4: archive the processed chunks; best effort, never fails the run.
        self.registry.update(
            task_id,
            TaskUpdate::processing(70, "Saving processed data..."),
        );
        self.archive_chunks(task_id, upload, &chunks).await;

        // Stage 5: embed and write to the search index.
        self.registry
            .update(task_id, TaskUpdate::processing(80, "Indexing to search..."));
        let index_name = upload
            .target_index
            .clone()
            .unwrap_or_else(|| config.search_index_name.clone());
        Ok(self.writer.write(&chunks, &index_name).await?)
    }

    async fn archive_chunks(&self, task_id: &str, upload: &RawUpload, chunks: &[Chunk]) {
        let payload = match serde_json::to_vec(chunks) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(task = task_id, %error, "Could not serialize processed chunks");
                return;
            }
        };
        let container = container_for_index(
            upload.target_index.as_deref(),
            "processed",
            &get_config().blob_processed_container,
        );
        let name = format!("{task_id}_processed.json");
        if let Err(error) = self.store.put(&name, payload, &container).await {
            tracing::warn!(task = task_id, %error, "Could not archive processed chunks");
        }
    }
}

#[async_trait]
impl IngestApi for IngestService {
    async fn submit(&self, upload: RawUpload) -> Result<String, TaskError> {
        let task_id = Uuid::new_v4().to_string();
        self.registry.create(&task_id)?;
        tracing::info!(task = %task_id, file = %upload.file_name, "Ingestion task accepted");

        let service = self.clone();
        let id = task_id.clone();
        tokio::spawn(async move {
            service.run(id, upload).await;
        });

        Ok(task_id)
    }

    fn task_snapshot(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.registry.get(task_id)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::AnalysisError;
    use crate::blob::{AccessHandle, BlobError};
    use crate::config::test_support::ensure_test_config;
    use crate::embedding::{EmbeddingClient, EmbeddingClientError};
    use crate::extraction::ExtractionError;
    use crate::index::{DocumentStatus, IndexDocument, IndexError, SearchIndexApi};
    use crate::pipeline::extract::SourceKind;
    use std::sync::Mutex;

    /// Records every stored blob; uploads always succeed.
    #[derive(Default)]
    struct MemoryStore {
        puts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl BlobStore for MemoryStore {
        async fn put(
            &self,
            name: &str,
            _bytes: Vec<u8>,
            container_hint: &str,
        ) -> Result<AccessHandle, BlobError> {
            self.puts
                .lock()
                .expect("puts lock")
                .push((container_hint.to_string(), name.to_string()));
            Ok(AccessHandle {
                url: format!("http://blob/{container_hint}/{name}"),
            })
        }
    }

    struct FailingExtractor;

    #[async_trait]
    impl DocumentExtractor for FailingExtractor {
        async fn extract(&self, _access_url: &str) -> Result<String, ExtractionError> {
            Err(ExtractionError::OperationFailed("scan unreadable".into()))
        }
    }

    struct RemoteExtractor;

    #[async_trait]
    impl DocumentExtractor for RemoteExtractor {
        async fn extract(&self, access_url: &str) -> Result<String, ExtractionError> {
            Ok(format!("remote text from {access_url}"))
        }
    }

    /// Echoes the analyzed text back as a single chunk, tagging the source kind.
    struct EchoAnalyzer;

    #[async_trait]
    impl ChunkAnalyzer for EchoAnalyzer {
        async fn analyze(
            &self,
            text: &str,
            kind: SourceKind,
            context: &ChunkContext,
        ) -> Result<Vec<Chunk>, AnalysisError> {
            Ok(vec![Chunk {
                id: "chunk-1".into(),
                parent_id: context.parent_id.clone(),
                file_name: context.file_name.clone(),
                file_type: kind.as_str().into(),
                content: text.to_string(),
                ..Chunk::default()
            }])
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingClient for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
            Ok(vec![0.0; 4])
        }
    }

    /// Accepts every batch; remembers the target index and document contents.
    #[derive(Default)]
    struct RecordingSearch {
        batches: Mutex<Vec<(String, Vec<IndexDocument>)>>,
        reject_all: bool,
    }

    #[async_trait]
    impl SearchIndexApi for RecordingSearch {
        async fn upload_documents(
            &self,
            index: &str,
            documents: &[IndexDocument],
        ) -> Result<Vec<DocumentStatus>, IndexError> {
            self.batches
                .lock()
                .expect("batches lock")
                .push((index.to_string(), documents.to_vec()));
            Ok(documents
                .iter()
                .map(|doc| DocumentStatus {
                    key: doc.id.clone(),
                    succeeded: !self.reject_all,
                    error_message: None,
                })
                .collect())
        }

        async fn ensure_index(&self, _index: &str) -> Result<(), IndexError> {
            Ok(())
        }
    }

    struct Harness {
        service: IngestService,
        store: Arc<MemoryStore>,
        search: Arc<RecordingSearch>,
    }

    fn harness(extractor: Arc<dyn DocumentExtractor>, reject_all: bool) -> Harness {
        ensure_test_config();
        let store = Arc::new(MemoryStore::default());
        let search = Arc::new(RecordingSearch {
            batches: Mutex::new(Vec::new()),
            reject_all,
        });
        let writer = Arc::new(IndexWriter::new(search.clone(), Arc::new(StubEmbedder)));
        let service = IngestService::new(
            Arc::new(TaskRegistry::new()),
            store.clone(),
            extractor,
            Arc::new(EchoAnalyzer),
            writer,
            Arc::new(IngestMetrics::new()),
        );
        Harness {
            service,
            store,
            search,
        }
    }

    #[tokio::test]
    async fn plain_text_upload_completes() {
        let h = harness(Arc::new(FailingExtractor), false);
        h.service.registry.create("t1").expect("create");
        h.service
            .run(
                "t1".into(),
                RawUpload::new("notes.txt", b"hello world".to_vec(), None),
            )
            .await;

        let task = h.service.task_snapshot("t1").expect("snapshot");
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.message, "Upload & indexing complete!");

        let puts = h.store.puts.lock().expect("puts lock");
        assert_eq!(
            *puts,
            vec![
                ("docpipe-raw".to_string(), "t1.txt".to_string()),
                (
                    "docpipe-processed".to_string(),
                    "t1_processed.json".to_string()
                ),
            ]
        );

        let batches = h.search.batches.lock().expect("batches lock");
        assert_eq!(batches.len(), 1);
        let (index, documents) = &batches[0];
        assert_eq!(index, "documents-index");
        assert_eq!(documents[0].content, "hello world");
        assert_eq!(documents[0].parent_id, "t1");

        assert_eq!(h.service.metrics_snapshot().documents_ingested, 1);
        assert_eq!(h.service.metrics_snapshot().chunks_indexed, 1);
    }

    #[tokio::test]
    async fn target_index_routes_storage_and_indexing() {
        let h = harness(Arc::new(FailingExtractor), false);
        h.service.registry.create("t2").expect("create");
        h.service
            .run(
                "t2".into(),
                RawUpload::new("api.md", b"# Routes".to_vec(), Some("Team_Wiki".into())),
            )
            .await;

        let puts = h.store.puts.lock().expect("puts lock");
        assert_eq!(puts[0].0, "team-wiki-raw");
        assert_eq!(puts[1].0, "team-wiki-processed");

        let batches = h.search.batches.lock().expect("batches lock");
        assert_eq!(batches[0].0, "Team_Wiki");
    }

    #[tokio::test]
    async fn binary_formats_use_the_remote_extractor() {
        let h = harness(Arc::new(RemoteExtractor), false);
        h.service.registry.create("t3").expect("create");
        h.service
            .run(
                "t3".into(),
                RawUpload::new("scan.pdf", vec![0xFF, 0xD8], None),
            )
            .await;

        let task = h.service.task_snapshot("t3").expect("snapshot");
        assert_eq!(task.status, TaskStatus::Completed);

        let batches = h.search.batches.lock().expect("batches lock");
        assert_eq!(
            batches[0].1[0].content,
            "remote text from http://blob/docpipe-raw/t3.pdf"
        );
    }

    #[tokio::test]
    async fn extraction_failure_fails_the_task_before_indexing() {
        let h = harness(Arc::new(FailingExtractor), false);
        h.service.registry.create("t4").expect("create");
        h.service
            .run(
                "t4".into(),
                RawUpload::new("scan.pdf", vec![0xFF, 0xD8], None),
            )
            .await;

        let task = h.service.task_snapshot("t4").expect("snapshot");
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.message.contains("Text extraction failed"));
        assert!(h.search.batches.lock().expect("batches lock").is_empty());
        assert_eq!(h.service.metrics_snapshot().tasks_failed, 1);
    }

    #[tokio::test]
    async fn empty_text_fails_the_task() {
        let h = harness(Arc::new(FailingExtractor), false);
        h.service.registry.create("t5").expect("create");
        h.service
            .run(
                "t5".into(),
                RawUpload::new("blank.txt", b"   \n ".to_vec(), None),
            )
            .await;

        let task = h.service.task_snapshot("t5").expect("snapshot");
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.message, "No text extracted from file.");
    }

    #[tokio::test]
    async fn zero_indexed_documents_is_a_warning_not_a_failure() {
        let h = harness(Arc::new(FailingExtractor), true);
        h.service.registry.create("t6").expect("create");
        h.service
            .run(
                "t6".into(),
                RawUpload::new("notes.txt", b"hello".to_vec(), None),
            )
            .await;

        let task = h.service.task_snapshot("t6").expect("snapshot");
        assert_eq!(task.status, TaskStatus::CompletedWithWarning);
        assert_eq!(task.progress, 100);
        assert_eq!(task.message, "Finished, but no documents indexed.");
        assert_eq!(h.service.metrics_snapshot().chunks_indexed, 0);
    }

    #[tokio::test]
    async fn submit_acknowledges_and_finishes_in_background() {
        let h = harness(Arc::new(FailingExtractor), false);
        let task_id = h
            .service
            .submit(RawUpload::new("notes.txt", b"hello".to_vec(), None))
            .await
            .expect("submit");

        // The task exists immediately, even if the run has not started yet.
        assert!(h.service.task_snapshot(&task_id).is_some());

        let mut status = TaskStatus::Pending;
        for _ in 0..200 {
            status = h.service.task_snapshot(&task_id).expect("snapshot").status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(status, TaskStatus::Completed);
    }
}
