//! Pinecone vector store integration.

pub mod client;
pub mod payload;
pub mod types;

pub use client::PineconeService;
pub use types::{IndexHandle, IndexSpec, PineconeError, ScoredMatch, VectorRecord};

use async_trait::async_trait;

/// Vector index operations the processing pipeline depends on.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Resolve the configured index, creating it (cosine, serverless) when it does not exist and
    /// waiting until it reports ready.
    async fn ensure_index(&self) -> Result<IndexHandle, PineconeError>;

    /// Resolve the configured index without creating it.
    async fn open_index(&self) -> Result<IndexHandle, PineconeError>;

    /// Write all records in bounded batches, returning the total count Pinecone reports.
    async fn upsert(
        &self,
        index: &IndexHandle,
        records: Vec<VectorRecord>,
    ) -> Result<usize, PineconeError>;

    /// Return up to `top_k` nearest matches with their metadata, best first.
    async fn query(
        &self,
        index: &IndexHandle,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>, PineconeError>;
}
