//! Core data types and error definitions for the processing pipeline.

use crate::{
    chat::ChatClientError, config::ConfigError, embedding::EmbeddingClientError,
    pinecone::PineconeError,
};
use std::fmt::Write as _;
use thiserror::Error;

/// Canned answer returned when no retrieved chunk clears the score threshold.
pub const NO_MATCH_ANSWER: &str =
    "I couldn't find any relevant information to answer your question.";

/// System prompt used when the caller does not supply one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant.";

/// Errors produced while configuring the splitter.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Splitter configured with an impossible chunk size.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap cannot exceed the chunk it overlaps.
    #[error("chunk overlap ({overlap}) is larger than chunk size ({chunk_size})")]
    OverlapExceedsChunkSize {
        /// Requested overlap.
        overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
}

/// Errors emitted by the ingestion and query pipelines.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Request input was rejected before any external call.
    #[error("{0}")]
    Validation(String),
    /// A client could not be built from configuration.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
    /// Splitter parameters were invalid.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Pinecone interaction failed.
    #[error("Pinecone request failed: {0}")]
    VectorStore(#[from] PineconeError),
    /// Chat-completion provider failed.
    #[error("Failed to generate answer: {0}")]
    Chat(#[from] ChatClientError),
    /// Embedding provider returned a different number of vectors than texts sent.
    #[error("Embedding count mismatch: sent {expected} texts, got {actual} vectors")]
    EmbeddingCountMismatch {
        /// Texts sent to the provider.
        expected: usize,
        /// Vectors returned.
        actual: usize,
    },
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured embedding dimension.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
}

/// Category an error belongs to, which decides the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request input (400).
    Validation,
    /// Missing or invalid configuration (500).
    Configuration,
    /// A managed service failed or misbehaved (500).
    UpstreamService,
}

impl ErrorKind {
    /// Name reported in the `type` field of error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Configuration => "ConfigurationError",
            Self::UpstreamService => "UpstreamServiceError",
        }
    }
}

impl ProcessingError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Configuration(_) | Self::Chunking(_) => ErrorKind::Configuration,
            Self::Embedding(_)
            | Self::VectorStore(_)
            | Self::Chat(_)
            | Self::EmbeddingCountMismatch { .. }
            | Self::DimensionMismatch { .. } => ErrorKind::UpstreamService,
        }
    }

    /// Render the error and its `source()` chain, one cause per line.
    pub fn diagnostic(&self) -> String {
        let mut rendered = format!("{}: {self}", self.kind().as_str());
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            let _ = write!(rendered, "\ncaused by: {cause}");
            source = cause.source();
        }
        rendered
    }
}

/// A contiguous piece of a source document, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Chunk text.
    pub text: String,
    /// Position of the chunk in split order.
    pub chunk_index: usize,
    /// Time the document was ingested.
    pub upload_date: String,
}

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Number of chunks produced and upserted.
    pub chunks_processed: usize,
}

/// Question submitted to the query pipeline.
#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    /// Natural language question.
    pub query: String,
    /// Optional system prompt override.
    pub system_prompt: Option<String>,
}

/// Retrieved chunk that cleared the score threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarDoc {
    /// Chunk text.
    pub content: String,
    /// Similarity score reported by the store.
    pub score: f32,
}

/// Result of the query pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// At least one chunk cleared the threshold and the model answered.
    Answered {
        /// Model answer, trimmed.
        answer: String,
        /// Context passed to the model.
        context: String,
        /// Chunks used to build the context, best first.
        similar_docs: Vec<SimilarDoc>,
    },
    /// Nothing relevant was retrieved.
    NoMatch {
        /// Original question.
        query: String,
        /// Number of chunks retrieved before filtering.
        documents_found: usize,
    },
}
