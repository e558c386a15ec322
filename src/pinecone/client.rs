//! HTTP client wrapper for interacting with Pinecone.

use crate::config::{Config, ConfigError};
use crate::pinecone::VectorStore;
use crate::pinecone::types::{
    IndexDescription, IndexHandle, IndexSpec, ListIndexesResponse, PineconeError, QueryResponse,
    ScoredMatch, UpsertResponse, VectorRecord,
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

const API_VERSION: &str = "2024-07";
/// Records sent per `/vectors/upsert` request, keeping bodies under Pinecone's 2 MB limit.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// How long to wait for a newly created index to report ready.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReadinessPolicy {
    pub(crate) poll_interval: Duration,
    pub(crate) timeout: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Lightweight HTTP client for Pinecone control- and data-plane operations.
pub struct PineconeService {
    pub(crate) client: Client,
    pub(crate) controller_url: String,
    pub(crate) api_key: String,
    pub(crate) index: IndexSpec,
    pub(crate) readiness: ReadinessPolicy,
    pub(crate) upsert_batch_size: usize,
}

impl PineconeService {
    /// Construct a new client from configuration.
    ///
    /// Fails when the Pinecone credential is empty or the controller URL does not parse.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        if config.pinecone_api_key.trim().is_empty() {
            return Err(ConfigError::MissingVariable("PINECONE_API_KEY".into()));
        }
        let controller_url = normalize_base_url(&config.pinecone_controller_url)
            .map_err(|error| ConfigError::InvalidValue(format!("PINECONE_CONTROLLER_URL ({error})")))?;
        let client = Client::builder()
            .user_agent("rag-functions/0.1")
            .build()
            .map_err(|error| ConfigError::InvalidValue(format!("HTTP client ({error})")))?;

        tracing::debug!(
            url = %controller_url,
            index = %config.pinecone_index_name,
            "Initialized Pinecone HTTP client"
        );

        Ok(Self {
            client,
            controller_url,
            api_key: config.pinecone_api_key.clone(),
            index: IndexSpec {
                name: config.pinecone_index_name.clone(),
                dimension: config.embedding_dimension,
                cloud: config.pinecone_cloud.clone(),
                region: config.pinecone_region.clone(),
            },
            readiness: ReadinessPolicy::default(),
            upsert_batch_size: UPSERT_BATCH_SIZE,
        })
    }

    /// Enumerate the indexes in the project.
    pub(crate) async fn list_indexes(&self) -> Result<Vec<IndexDescription>, PineconeError> {
        let url = format_endpoint(&self.controller_url, "indexes");
        let response = self.request(Method::GET, url).send().await?;
        let response = check_status(response, "list indexes").await?;
        let payload: ListIndexesResponse = response.json().await?;
        Ok(payload.indexes)
    }

    /// Fetch the description of a single index.
    pub(crate) async fn describe_index(
        &self,
        name: &str,
    ) -> Result<IndexDescription, PineconeError> {
        let url = format_endpoint(&self.controller_url, &format!("indexes/{name}"));
        let response = self.request(Method::GET, url).send().await?;
        let response = check_status(response, "describe index").await?;
        Ok(response.json().await?)
    }

    /// Create a serverless cosine index. Returns `None` when it already exists.
    pub(crate) async fn create_index(
        &self,
        spec: &IndexSpec,
    ) -> Result<Option<IndexDescription>, PineconeError> {
        let body = json!({
            "name": spec.name,
            "dimension": spec.dimension,
            "metric": "cosine",
            "spec": {
                "serverless": {
                    "cloud": spec.cloud,
                    "region": spec.region,
                }
            }
        });

        let url = format_endpoint(&self.controller_url, "indexes");
        let response = self.request(Method::POST, url).json(&body).send().await?;

        if response.status() == StatusCode::CONFLICT {
            tracing::debug!(index = %spec.name, "Index already exists");
            return Ok(None);
        }
        let response = check_status(response, "create index").await?;
        tracing::info!(
            index = %spec.name,
            dimension = spec.dimension,
            cloud = %spec.cloud,
            region = %spec.region,
            "Created index"
        );
        Ok(Some(response.json().await?))
    }

    /// Poll the index description until Pinecone reports it ready.
    async fn wait_until_ready(
        &self,
        description: IndexDescription,
    ) -> Result<IndexDescription, PineconeError> {
        if description.is_ready() {
            return Ok(description);
        }

        tracing::info!(index = %self.index.name, "Waiting for index to become ready");
        let started = Instant::now();
        loop {
            if started.elapsed() >= self.readiness.timeout {
                return Err(PineconeError::IndexNotReady {
                    name: self.index.name.clone(),
                    waited: self.readiness.timeout,
                });
            }
            tokio::time::sleep(self.readiness.poll_interval).await;

            let current = self.describe_index(&self.index.name).await?;
            if current.is_ready() {
                tracing::info!(
                    index = %current.name,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Index ready"
                );
                return Ok(current);
            }
            tracing::debug!(
                index = %current.name,
                state = current.status.as_ref().and_then(|status| status.state.as_deref()),
                "Index not ready yet"
            );
        }
    }

    async fn resolve_handle(
        &self,
        description: Option<IndexDescription>,
    ) -> Result<IndexHandle, PineconeError> {
        let description = match description {
            Some(description) if description.host.is_some() => description,
            _ => self.describe_index(&self.index.name).await?,
        };
        if let Some(dimension) = description.dimension
            && dimension != self.index.dimension
        {
            tracing::warn!(
                index = %description.name,
                index_dimension = dimension,
                embedding_dimension = self.index.dimension,
                "Index dimension differs from the embedding dimension"
            );
        }
        let host = description
            .host
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| PineconeError::MissingHost(description.name.clone()))?;
        Ok(IndexHandle {
            name: description.name,
            host,
        })
    }

    fn request(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }
}

#[async_trait]
impl VectorStore for PineconeService {
    async fn ensure_index(&self) -> Result<IndexHandle, PineconeError> {
        let existing = self
            .list_indexes()
            .await?
            .into_iter()
            .find(|index| index.name == self.index.name);

        let description = match existing {
            Some(description) => description,
            None => {
                tracing::debug!(index = %self.index.name, "Index missing; creating");
                match self.create_index(&self.index).await? {
                    Some(created) => created,
                    None => self.describe_index(&self.index.name).await?,
                }
            }
        };
        let description = self.wait_until_ready(description).await?;
        self.resolve_handle(Some(description)).await
    }

    async fn open_index(&self) -> Result<IndexHandle, PineconeError> {
        self.resolve_handle(None).await
    }

    async fn upsert(
        &self,
        index: &IndexHandle,
        records: Vec<VectorRecord>,
    ) -> Result<usize, PineconeError> {
        let url = format_endpoint(&data_plane_url(&index.host), "vectors/upsert");
        let mut total = 0;
        for batch in records.chunks(self.upsert_batch_size.max(1)) {
            let response = self
                .request(Method::POST, url.clone())
                .json(&json!({ "vectors": batch }))
                .send()
                .await?;
            let response = check_status(response, "upsert").await?;
            let UpsertResponse { upserted_count } = response.json().await?;

            tracing::debug!(
                index = %index.name,
                sent = batch.len(),
                upserted = upserted_count,
                "Vectors upserted"
            );
            total += upserted_count;
        }
        Ok(total)
    }

    async fn query(
        &self,
        index: &IndexHandle,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<ScoredMatch>, PineconeError> {
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });

        let url = format_endpoint(&data_plane_url(&index.host), "query");
        let response = self.request(Method::POST, url).json(&body).send().await?;
        let response = check_status(response, "query").await?;
        let payload: QueryResponse = response.json().await?;

        Ok(payload
            .matches
            .into_iter()
            .map(|item| ScoredMatch {
                id: item.id,
                score: item.score,
                metadata: item.metadata,
            })
            .collect())
    }
}

async fn check_status(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<reqwest::Response, PineconeError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = PineconeError::UnexpectedStatus { status, body };
    tracing::error!(operation, error = %error, "Pinecone request failed");
    Err(error)
}

fn normalize_base_url(url: &str) -> Result<String, PineconeError> {
    let parsed =
        reqwest::Url::parse(url).map_err(|err| PineconeError::InvalidUrl(err.to_string()))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

fn data_plane_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
