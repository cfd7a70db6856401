#![deny(missing_docs)]

//! Core library for the docpipe ingestion server.

/// Structured-chunk generation client and the typed chunk model.
pub mod analyze;
/// HTTP routing and REST handlers.
pub mod api;
/// Object storage adapter for raw and processed artifacts.
pub mod blob;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Remote document text extraction client.
pub mod extraction;
/// Search index writer and HTTP client.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Ingestion gateway and staged pipeline.
pub mod pipeline;
/// Task registry with lifecycle and progress tracking.
pub mod tasks;
