//! Processing service coordinating chunking, embedding, Pinecone and chat-completion calls.

use crate::{
    chat::{ChatClient, ChatMessage, ChatRequest, get_chat_client},
    config::Config,
    embedding::{EmbeddingClient, get_embedding_client},
    pinecone::{
        PineconeService, VectorRecord, VectorStore,
        payload::{build_metadata, extract_text, generate_vector_id, upload_timestamp},
    },
    processing::{
        chunking::{RecursiveCharacterSplitter, build_chunks},
        types::{
            AnswerOutcome, AnswerRequest, DEFAULT_SYSTEM_PROMPT, IngestOutcome, ProcessingError,
            SimilarDoc,
        },
    },
};
use async_trait::async_trait;

const ANSWER_TEMPERATURE: f32 = 0.2;
const ANSWER_MAX_TOKENS: u32 = 800;

/// Knobs the pipelines read on every request, captured from [`Config`] at construction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Expected embedding dimension.
    pub embedding_dimension: usize,
    /// Number of matches retrieved per query.
    pub top_k: usize,
    /// Matches must score strictly above this to be used.
    pub score_threshold: f32,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            embedding_dimension: config.embedding_dimension,
            top_k: config.retrieval_top_k,
            score_threshold: config.retrieval_score_threshold,
        }
    }
}

/// Runs the ingestion and query pipelines against injected clients.
///
/// Construct the service once near process start and share it through an `Arc`; it holds no
/// mutable state.
pub struct ProcessingService {
    settings: PipelineSettings,
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    vector_store: Box<dyn VectorStore>,
    chat_client: Box<dyn ChatClient + Send + Sync>,
}

/// Abstraction over the processing pipeline used by the HTTP surface.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Chunk, embed, and upsert a document into the index.
    async fn process_document(&self, text: String) -> Result<IngestOutcome, ProcessingError>;

    /// Retrieve context for a question and ask the chat model to answer it.
    async fn answer_query(&self, request: AnswerRequest)
    -> Result<AnswerOutcome, ProcessingError>;
}

impl ProcessingService {
    /// Build the service with OpenAI and Pinecone clients derived from configuration.
    pub fn new(config: &Config) -> Result<Self, ProcessingError> {
        tracing::info!("Initializing embedding client");
        let embedding_client = get_embedding_client(config)?;
        tracing::info!("Initializing Pinecone client");
        let vector_store = Box::new(PineconeService::new(config)?);
        let chat_client = get_chat_client(config)?;
        tracing::info!(index = %config.pinecone_index_name, "Processing service ready");

        Self::with_clients(
            PipelineSettings::from(config),
            embedding_client,
            vector_store,
            chat_client,
        )
    }

    /// Build the service around explicit clients.
    pub fn with_clients(
        settings: PipelineSettings,
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
        vector_store: Box<dyn VectorStore>,
        chat_client: Box<dyn ChatClient + Send + Sync>,
    ) -> Result<Self, ProcessingError> {
        RecursiveCharacterSplitter::new(settings.chunk_size, settings.chunk_overlap)?;
        Ok(Self {
            settings,
            embedding_client,
            vector_store,
            chat_client,
        })
    }

    /// Chunk, embed, and upsert a document.
    pub async fn process_document(&self, text: String) -> Result<IngestOutcome, ProcessingError> {
        if text.is_empty() {
            return Err(ProcessingError::Validation("No content received".into()));
        }

        let splitter =
            RecursiveCharacterSplitter::new(self.settings.chunk_size, self.settings.chunk_overlap)?;
        let texts = splitter.split_text(&text);
        let chunks = build_chunks(texts, &upload_timestamp());
        tracing::debug!(
            chunks = chunks.len(),
            chunk_size = self.settings.chunk_size,
            chunk_overlap = self.settings.chunk_overlap,
            "Document split"
        );

        let index = self.vector_store.ensure_index().await?;

        if chunks.is_empty() {
            tracing::info!(index = %index.name, "Document produced no chunks");
            return Ok(IngestOutcome {
                chunks_processed: 0,
            });
        }

        let inputs: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedding_client.generate_embeddings(inputs).await?;
        if embeddings.len() != chunks.len() {
            return Err(ProcessingError::EmbeddingCountMismatch {
                expected: chunks.len(),
                actual: embeddings.len(),
            });
        }
        for values in &embeddings {
            self.check_dimension(values)?;
        }

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, values)| VectorRecord {
                id: generate_vector_id(),
                values,
                metadata: build_metadata(chunk),
            })
            .collect();

        let upserted = self.vector_store.upsert(&index, records).await?;
        tracing::info!(
            index = %index.name,
            chunks = chunks.len(),
            upserted,
            "Document indexed"
        );

        Ok(IngestOutcome {
            chunks_processed: chunks.len(),
        })
    }

    /// Answer a question from the indexed chunks.
    pub async fn answer_query(
        &self,
        request: AnswerRequest,
    ) -> Result<AnswerOutcome, ProcessingError> {
        let AnswerRequest {
            query,
            system_prompt,
        } = request;
        if query.is_empty() {
            return Err(ProcessingError::Validation("No query provided".into()));
        }

        let vector = self
            .embedding_client
            .generate_embeddings(vec![query.clone()])
            .await?
            .pop()
            .ok_or(ProcessingError::EmbeddingCountMismatch {
                expected: 1,
                actual: 0,
            })?;

        self.check_dimension(&vector)?;

        let index = self.vector_store.open_index().await?;
        let matches = self
            .vector_store
            .query(&index, vector, self.settings.top_k)
            .await?;

        let retrieved: Vec<SimilarDoc> = matches
            .into_iter()
            .filter_map(|item| match extract_text(item.metadata.as_ref()) {
                Some(content) => Some(SimilarDoc {
                    content,
                    score: item.score,
                }),
                None => {
                    tracing::warn!(id = %item.id, "Match has no text metadata; skipping");
                    None
                }
            })
            .collect();
        let documents_found = retrieved.len();

        let threshold = self.settings.score_threshold;
        let similar_docs: Vec<SimilarDoc> = retrieved
            .into_iter()
            .filter(|doc| doc.score > threshold)
            .collect();

        tracing::debug!(
            documents_found,
            relevant = similar_docs.len(),
            threshold,
            "Retrieved context"
        );

        if similar_docs.is_empty() {
            return Ok(AnswerOutcome::NoMatch {
                query,
                documents_found,
            });
        }

        let context = similar_docs
            .iter()
            .map(|doc| doc.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let system_prompt = system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let answer = self
            .chat_client
            .complete(ChatRequest {
                messages: vec![
                    ChatMessage::system(system_prompt),
                    ChatMessage::user(format!("Context:\n{context}\n\nQuestion: {query}")),
                ],
                temperature: ANSWER_TEMPERATURE,
                max_tokens: ANSWER_MAX_TOKENS,
            })
            .await?;

        Ok(AnswerOutcome::Answered {
            answer,
            context,
            similar_docs,
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), ProcessingError> {
        let expected = self.settings.embedding_dimension;
        if vector.len() != expected {
            return Err(ProcessingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn process_document(&self, text: String) -> Result<IngestOutcome, ProcessingError> {
        ProcessingService::process_document(self, text).await
    }

    async fn answer_query(
        &self,
        request: AnswerRequest,
    ) -> Result<AnswerOutcome, ProcessingError> {
        ProcessingService::answer_query(self, request).await
    }
}
