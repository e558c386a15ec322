//! Document processing pipelines: chunking, embedding, retrieval, and answering.

pub mod chunking;
mod service;
pub mod types;

pub use service::{PipelineSettings, ProcessingApi, ProcessingService};
pub use types::{
    AnswerOutcome, AnswerRequest, Chunk, ChunkingError, DEFAULT_SYSTEM_PROMPT, ErrorKind,
    IngestOutcome, NO_MATCH_ANSWER, ProcessingError, SimilarDoc,
};
