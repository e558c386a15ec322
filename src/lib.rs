#![deny(missing_docs)]

//! Core library for the document ingestion and question-answering functions.

/// HTTP routing and request handlers.
pub mod api;
/// Chat-completion client abstraction and adapters.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Structured logging and tracing setup.
pub mod logging;
/// Pinecone vector store integration.
pub mod pinecone;
/// Document processing pipelines.
pub mod processing;
