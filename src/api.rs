//! HTTP surface for the two functions.
//!
//! The Functions host forwards each HTTP trigger to the custom handler under `/api/<function>`:
//!
//! - `POST /api/process_document` – Raw text body. Chunks, embeds and upserts the document and
//!   returns `{ "status": "success", "chunks_processed": n }`. Failures return
//!   `{ "error", "type", "trace" }`.
//! - `POST /api/get_answer` – JSON `{ "query", "system_prompt"? }`. Returns
//!   `{ "answer", "context", "similar_docs": [{ "content", "score" }] }`, or
//!   `{ "answer", "metadata": { "query", "documents_found" } }` when nothing relevant was found.
//!   Failures return `{ "error" }`.
//!
//! Validation failures map to `400`; configuration and upstream failures map to `500`.

use crate::processing::{
    AnswerOutcome, AnswerRequest, ErrorKind, NO_MATCH_ANSWER, ProcessingApi, ProcessingError,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 100;

/// Largest document body `process_document` accepts, matching the Functions host request limit.
pub const MAX_DOCUMENT_BYTES: usize = 100 * 1024 * 1024;

/// Build the HTTP router exposing both functions.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ProcessingApi + 'static,
{
    router_with_document_limit(service, MAX_DOCUMENT_BYTES)
}

fn router_with_document_limit<S>(service: Arc<S>, document_limit: usize) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route(
            "/api/process_document",
            post(process_document::<S>).layer(DefaultBodyLimit::max(document_limit)),
        )
        .route("/api/get_answer", post(get_answer::<S>))
        .with_state(service)
}

/// Success response for `process_document`.
#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    chunks_processed: usize,
}

/// Chunk, embed and index the raw request body.
async fn process_document<S>(
    State(service): State<Arc<S>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<IngestResponse>, IngestFailure>
where
    S: ProcessingApi,
{
    tracing::info!("Process Document function processed a request.");

    let body = body.map_err(IngestFailure::Body)?;
    let content = String::from_utf8(body.to_vec()).map_err(|_| {
        IngestFailure::Processing(ProcessingError::Validation(
            "Request body is not valid UTF-8".into(),
        ))
    })?;
    tracing::info!(preview = %preview(&content), bytes = content.len(), "Content received");

    if content.is_empty() {
        return Err(IngestFailure::Processing(ProcessingError::Validation(
            "No content received".into(),
        )));
    }

    let outcome = service.process_document(content).await?;
    Ok(Json(IngestResponse {
        status: "success",
        chunks_processed: outcome.chunks_processed,
    }))
}

/// Request body for `get_answer`.
#[derive(Deserialize)]
struct AnswerBody {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
}

#[derive(Serialize)]
struct SimilarDocBody {
    content: String,
    score: f32,
}

#[derive(Serialize)]
struct NoMatchMetadata {
    query: String,
    documents_found: usize,
}

/// Response body for `get_answer`; the two shapes are distinguished by their fields.
#[derive(Serialize)]
#[serde(untagged)]
enum AnswerResponse {
    Answered {
        answer: String,
        context: String,
        similar_docs: Vec<SimilarDocBody>,
    },
    NoMatch {
        answer: &'static str,
        metadata: NoMatchMetadata,
    },
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        match outcome {
            AnswerOutcome::Answered {
                answer,
                context,
                similar_docs,
            } => Self::Answered {
                answer,
                context,
                similar_docs: similar_docs
                    .into_iter()
                    .map(|doc| SimilarDocBody {
                        content: doc.content,
                        score: doc.score,
                    })
                    .collect(),
            },
            AnswerOutcome::NoMatch {
                query,
                documents_found,
            } => Self::NoMatch {
                answer: NO_MATCH_ANSWER,
                metadata: NoMatchMetadata {
                    query,
                    documents_found,
                },
            },
        }
    }
}

/// Answer a question from the indexed documents.
async fn get_answer<S>(
    State(service): State<Arc<S>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<AnswerResponse>, AnswerFailure>
where
    S: ProcessingApi,
{
    tracing::info!("Get Answer function processed a request.");

    let body = body.map_err(AnswerFailure::Body)?;
    let AnswerBody {
        query,
        system_prompt,
    } = serde_json::from_slice::<AnswerBody>(&body).map_err(|error| {
        AnswerFailure::Processing(ProcessingError::Validation(format!(
            "Invalid JSON body: {error}"
        )))
    })?;

    let query = query
        .filter(|query| !query.is_empty())
        .ok_or_else(|| {
            AnswerFailure::Processing(ProcessingError::Validation("No query provided".into()))
        })?;

    let outcome = service
        .answer_query(AnswerRequest {
            query,
            system_prompt,
        })
        .await?;
    if let AnswerOutcome::NoMatch {
        documents_found, ..
    } = &outcome
    {
        tracing::info!(documents_found, "No relevant documents for query");
    }
    Ok(Json(outcome.into()))
}

fn preview(content: &str) -> &str {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}

/// The body could not be read, most often because it exceeded the route's size limit.
fn rejected_body(rejection: BytesRejection) -> Response {
    let status = rejection.status();
    let message = rejection.body_text();
    tracing::warn!(%status, error = %message, "Rejected request body");
    (status, Json(json!({ "error": message }))).into_response()
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Configuration | ErrorKind::UpstreamService => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Ingestion failure; server errors carry the category and the formatted cause chain.
enum IngestFailure {
    Body(BytesRejection),
    Processing(ProcessingError),
}

impl IntoResponse for IngestFailure {
    fn into_response(self) -> Response {
        let error = match self {
            Self::Body(rejection) => return rejected_body(rejection),
            Self::Processing(error) => error,
        };
        let kind = error.kind();
        let status = status_for(kind);
        if kind == ErrorKind::Validation {
            tracing::warn!(%error, "Rejected document");
            return (status, Json(json!({ "error": error.to_string() }))).into_response();
        }

        let trace = error.diagnostic();
        tracing::error!(%error, kind = kind.as_str(), %trace, "Error processing document");
        (
            status,
            Json(json!({
                "error": error.to_string(),
                "type": kind.as_str(),
                "trace": trace,
            })),
        )
            .into_response()
    }
}

impl From<ProcessingError> for IngestFailure {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

/// Query failure; every status carries only `{ "error" }`.
enum AnswerFailure {
    Body(BytesRejection),
    Processing(ProcessingError),
}

impl IntoResponse for AnswerFailure {
    fn into_response(self) -> Response {
        let error = match self {
            Self::Body(rejection) => return rejected_body(rejection),
            Self::Processing(error) => error,
        };
        let kind = error.kind();
        if kind == ErrorKind::Validation {
            tracing::warn!(%error, "Rejected query");
        } else {
            tracing::error!(%error, kind = kind.as_str(), "Error generating answer");
        }
        (
            status_for(kind),
            Json(json!({ "error": error.to_string() })),
        )
            .into_response()
    }
}

impl From<ProcessingError> for AnswerFailure {
    fn from(inner: ProcessingError) -> Self {
        Self::Processing(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, preview, router_with_document_limit};
    use crate::config::ConfigError;
    use crate::embedding::EmbeddingClientError;
    use crate::processing::{
        AnswerOutcome, AnswerRequest, IngestOutcome, ProcessingApi, ProcessingError, SimilarDoc,
    };
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
        response::Response,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        FailUpstream,
        FailConfig,
    }

    struct StubProcessingService {
        documents: Mutex<Vec<String>>,
        queries: Mutex<Vec<AnswerRequest>>,
        answer: AnswerOutcome,
        behavior: Behavior,
    }

    impl StubProcessingService {
        fn new(answer: AnswerOutcome, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                documents: Mutex::new(Vec::new()),
                queries: Mutex::new(Vec::new()),
                answer,
                behavior,
            })
        }

        fn failure(&self) -> Option<ProcessingError> {
            match self.behavior {
                Behavior::Succeed => None,
                Behavior::FailUpstream => Some(ProcessingError::Embedding(
                    EmbeddingClientError::GenerationFailed("OpenAI returned 429".into()),
                )),
                Behavior::FailConfig => Some(ProcessingError::Configuration(
                    ConfigError::MissingVariable("PINECONE_API_KEY".into()),
                )),
            }
        }
    }

    #[async_trait]
    impl ProcessingApi for StubProcessingService {
        async fn process_document(&self, text: String) -> Result<IngestOutcome, ProcessingError> {
            let chunks_processed = text.chars().count().div_ceil(800).max(1);
            self.documents.lock().await.push(text);
            match self.failure() {
                Some(error) => Err(error),
                None => Ok(IngestOutcome { chunks_processed }),
            }
        }

        async fn answer_query(
            &self,
            request: AnswerRequest,
        ) -> Result<AnswerOutcome, ProcessingError> {
            self.queries.lock().await.push(request);
            match self.failure() {
                Some(error) => Err(error),
                None => Ok(self.answer.clone()),
            }
        }
    }

    fn no_match(documents_found: usize) -> AnswerOutcome {
        AnswerOutcome::NoMatch {
            query: "x".into(),
            documents_found,
        }
    }

    async fn post(
        service: Arc<StubProcessingService>,
        uri: &str,
        body: impl Into<Body>,
    ) -> Response {
        create_router(service)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(uri)
                    .body(body.into())
                    .expect("request"),
            )
            .await
            .expect("router response")
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn process_document_reports_chunk_count() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = post(service.clone(), "/api/process_document", "A".repeat(1500)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "status": "success", "chunks_processed": 2 })
        );
        assert_eq!(service.documents.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn documents_above_two_megabytes_are_accepted() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = post(
            service.clone(),
            "/api/process_document",
            "word ".repeat(600_000),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "success");
        assert_eq!(service.documents.lock().await[0].len(), 3_000_000);
    }

    #[tokio::test]
    async fn oversized_document_gets_json_error() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = router_with_document_limit(service.clone(), 16)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/process_document")
                    .body(Body::from("x".repeat(17)))
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert!(body["error"].as_str().expect("error").contains("length limit"));
        assert!(service.documents.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_document_is_rejected_before_processing() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = post(service.clone(), "/api/process_document", Body::empty()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "No content received");
        assert!(service.documents.lock().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_document_is_rejected() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = post(
            service.clone(),
            "/api/process_document",
            vec![0xff_u8, 0xfe, 0xfd],
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(service.documents.lock().await.is_empty());
    }

    #[tokio::test]
    async fn process_document_failure_carries_type_and_trace() {
        let service = StubProcessingService::new(no_match(0), Behavior::FailUpstream);
        let response = post(service, "/api/process_document", "hello").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["type"], "UpstreamServiceError");
        assert!(body["error"].as_str().expect("error").contains("429"));
        let trace = body["trace"].as_str().expect("trace");
        assert!(trace.starts_with("UpstreamServiceError: "));
        assert!(trace.contains("caused by: OpenAI returned 429"));
    }

    #[tokio::test]
    async fn configuration_failure_is_a_server_error() {
        let service = StubProcessingService::new(no_match(0), Behavior::FailConfig);
        let response = post(service, "/api/process_document", "hello").await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["type"], "ConfigurationError");
        assert!(body["error"].as_str().expect("error").contains("PINECONE_API_KEY"));
    }

    #[tokio::test]
    async fn missing_query_is_rejected() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = post(
            service.clone(),
            "/api/get_answer",
            json!({ "system_prompt": "hi" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "No query provided" })
        );
        assert!(service.queries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = post(
            service.clone(),
            "/api/get_answer",
            json!({ "query": "" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(service.queries.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let service = StubProcessingService::new(no_match(0), Behavior::Succeed);
        let response = post(service.clone(), "/api/get_answer", "{not json").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(
            json_body(response).await["error"]
                .as_str()
                .expect("error")
                .starts_with("Invalid JSON body")
        );
    }

    #[tokio::test]
    async fn no_match_variant_reports_documents_found() {
        let service = StubProcessingService::new(no_match(3), Behavior::Succeed);
        let response = post(
            service.clone(),
            "/api/get_answer",
            json!({ "query": "x" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "answer": "I couldn't find any relevant information to answer your question.",
                "metadata": { "query": "x", "documents_found": 3 }
            })
        );
        let queries = service.queries.lock().await;
        assert_eq!(queries[0].query, "x");
        assert_eq!(queries[0].system_prompt, None);
    }

    #[tokio::test]
    async fn answered_variant_lists_similar_docs() {
        let answer = AnswerOutcome::Answered {
            answer: "Forty-two.".into(),
            context: "first\n\nsecond".into(),
            similar_docs: vec![
                SimilarDoc {
                    content: "first".into(),
                    score: 0.9,
                },
                SimilarDoc {
                    content: "second".into(),
                    score: 0.75,
                },
            ],
        };
        let service = StubProcessingService::new(answer, Behavior::Succeed);
        let response = post(
            service.clone(),
            "/api/get_answer",
            json!({ "query": "meaning?", "system_prompt": "Be terse." }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "Forty-two.");
        assert_eq!(body["context"], "first\n\nsecond");
        let docs = body["similar_docs"].as_array().expect("docs");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["content"], "first");
        assert!((docs[0]["score"].as_f64().expect("score") - 0.9).abs() < 1e-6);
        assert!(body.get("metadata").is_none());

        let queries = service.queries.lock().await;
        assert_eq!(queries[0].system_prompt.as_deref(), Some("Be terse."));
    }

    #[tokio::test]
    async fn query_failure_returns_error_only() {
        let service = StubProcessingService::new(no_match(0), Behavior::FailUpstream);
        let response = post(
            service,
            "/api/get_answer",
            json!({ "query": "x" }).to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"].as_str().expect("error").contains("429"));
        assert!(body.get("trace").is_none());
        assert!(body.get("type").is_none());
    }

    #[test]
    fn preview_truncates_on_char_boundaries() {
        let text = "é".repeat(150);
        assert_eq!(preview(&text).chars().count(), 100);
        assert_eq!(preview("short"), "short");
    }
}
