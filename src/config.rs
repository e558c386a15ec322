//! Environment-driven configuration.
//!
//! Everything the functions need is read once at startup into a [`Config`] value, validated, and
//! handed to the processing service. Nothing reads the environment while serving a request.

use std::env;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_PINECONE_CONTROLLER_URL: &str = "https://api.pinecone.io";
const DEFAULT_INDEX_NAME: &str = "langchain";
const DEFAULT_PINECONE_CLOUD: &str = "aws";
const DEFAULT_PINECONE_REGION: &str = "us-east-1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4";
const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.7;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for both functions.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the OpenAI embeddings and chat endpoints.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible API (without trailing slash).
    pub openai_base_url: String,
    /// API key for the Pinecone control and data planes.
    pub pinecone_api_key: String,
    /// Base URL of the Pinecone control plane.
    pub pinecone_controller_url: String,
    /// Name of the Pinecone index that stores chunk vectors.
    pub pinecone_index_name: String,
    /// Cloud used when the index has to be created.
    pub pinecone_cloud: String,
    /// Region used when the index has to be created.
    pub pinecone_region: String,
    /// Embedding model identifier passed to OpenAI.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Chat-completion model used to answer questions.
    pub chat_model: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Number of nearest chunks retrieved per query.
    pub retrieval_top_k: usize,
    /// Matches must score strictly above this value to be used as context.
    pub retrieval_score_threshold: f32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Build a configuration with the given credentials and every other setting at its default.
    pub fn with_credentials(
        openai_api_key: impl Into<String>,
        pinecone_api_key: impl Into<String>,
    ) -> Self {
        Self {
            openai_api_key: openai_api_key.into(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            pinecone_api_key: pinecone_api_key.into(),
            pinecone_controller_url: DEFAULT_PINECONE_CONTROLLER_URL.to_string(),
            pinecone_index_name: DEFAULT_INDEX_NAME.to_string(),
            pinecone_cloud: DEFAULT_PINECONE_CLOUD.to_string(),
            pinecone_region: DEFAULT_PINECONE_REGION.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            retrieval_top_k: DEFAULT_TOP_K,
            retrieval_score_threshold: DEFAULT_SCORE_THRESHOLD,
            server_port: None,
        }
    }

    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as absent, so an exported-but-empty credential still fails fast.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
        };

        let mut config = Self::with_credentials(
            required("OPENAI_API_KEY")?,
            required("PINECONE_API_KEY")?,
        );

        if let Some(value) = optional("OPENAI_BASE_URL") {
            config.openai_base_url = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = optional("PINECONE_CONTROLLER_URL") {
            config.pinecone_controller_url = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = optional("PINECONE_INDEX_NAME") {
            config.pinecone_index_name = value;
        }
        if let Some(value) = optional("PINECONE_CLOUD") {
            config.pinecone_cloud = value;
        }
        if let Some(value) = optional("PINECONE_REGION") {
            config.pinecone_region = value;
        }
        if let Some(value) = optional("EMBEDDING_MODEL") {
            config.embedding_model = value;
        }
        if let Some(value) = optional("EMBEDDING_DIMENSION") {
            config.embedding_dimension = parse_value("EMBEDDING_DIMENSION", &value)?;
        }
        if let Some(value) = optional("CHAT_MODEL") {
            config.chat_model = value;
        }
        if let Some(value) = optional("TEXT_SPLITTER_CHUNK_SIZE") {
            config.chunk_size = parse_value("TEXT_SPLITTER_CHUNK_SIZE", &value)?;
        }
        if let Some(value) = optional("TEXT_SPLITTER_CHUNK_OVERLAP") {
            config.chunk_overlap = parse_value("TEXT_SPLITTER_CHUNK_OVERLAP", &value)?;
        }
        if let Some(value) = optional("RETRIEVAL_TOP_K") {
            config.retrieval_top_k = parse_value("RETRIEVAL_TOP_K", &value)?;
        }
        if let Some(value) = optional("RETRIEVAL_SCORE_THRESHOLD") {
            config.retrieval_score_threshold = parse_value("RETRIEVAL_SCORE_THRESHOLD", &value)?;
        }
        // The Functions host hands custom handlers their port through this variable.
        config.server_port = optional("FUNCTIONS_CUSTOMHANDLER_PORT")
            .map(|value| ("FUNCTIONS_CUSTOMHANDLER_PORT", value))
            .or_else(|| optional("SERVER_PORT").map(|value| ("SERVER_PORT", value)))
            .map(|(key, value)| parse_value(key, &value))
            .transpose()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that individual parsing cannot catch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".into()));
        }
        if self.chunk_overlap > self.chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".into(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        if !(0.0..=1.0).contains(&self.retrieval_score_threshold) {
            return Err(ConfigError::InvalidValue("RETRIEVAL_SCORE_THRESHOLD".into()));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

/// Load `.env` (when present) and then the configuration from the process environment.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        index = %config.pinecone_index_name,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        chat_model = %config.chat_model,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
