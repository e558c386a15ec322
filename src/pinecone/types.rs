//! Shared types used by the Pinecone client and helpers.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Errors returned while interacting with Pinecone.
#[derive(Debug, Error)]
pub enum PineconeError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Pinecone URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Pinecone responded with an unexpected status code.
    #[error("Unexpected Pinecone response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Pinecone.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// A newly created index did not report ready within the allowed wait.
    #[error("Index '{name}' was not ready after {waited:?}")]
    IndexNotReady {
        /// Index name.
        name: String,
        /// How long readiness was polled for.
        waited: Duration,
    },
    /// Index description did not include a data-plane host.
    #[error("Index '{0}' has no data-plane host yet")]
    MissingHost(String),
}

/// Settings used when the target index has to be created.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Vector dimensionality.
    pub dimension: usize,
    /// Serverless cloud provider.
    pub cloud: String,
    /// Serverless region.
    pub region: String,
}

/// Vector ready for upsert.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    /// Opaque identifier of the vector.
    pub id: String,
    /// Dense embedding values.
    pub values: Vec<f32>,
    /// Metadata stored alongside the vector (`text`, `chunk_index`, `upload_date`).
    pub metadata: Map<String, Value>,
}

/// Scored match returned by a similarity query.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    /// Identifier of the matched vector.
    pub id: String,
    /// Similarity score computed by Pinecone.
    pub score: f32,
    /// Metadata stored with the vector, when requested.
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IndexDescription {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) dimension: Option<usize>,
    #[serde(default)]
    pub(crate) host: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<IndexStatus>,
}

impl IndexDescription {
    /// Descriptions without a status block are treated as ready.
    pub(crate) fn is_ready(&self) -> bool {
        self.status.as_ref().is_none_or(|status| status.ready)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct IndexStatus {
    #[serde(default)]
    pub(crate) ready: bool,
    #[serde(default)]
    pub(crate) state: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct ListIndexesResponse {
    #[serde(default)]
    pub(crate) indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
pub(crate) struct UpsertResponse {
    #[serde(rename = "upsertedCount", default)]
    pub(crate) upserted_count: usize,
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub(crate) matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
pub(crate) struct QueryMatch {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) metadata: Option<Map<String, Value>>,
}

/// Resolved index ready for data-plane calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    /// Index name.
    pub name: String,
    /// Data-plane host, with or without scheme.
    pub host: String,
}
