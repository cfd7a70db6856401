use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration for the docpipe server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the blob storage account holding raw and processed artifacts.
    pub blob_endpoint: String,
    /// Optional pre-signed SAS token appended to blob URLs.
    pub blob_sas_token: Option<String>,
    /// Default container for raw uploads when no target index is given.
    pub blob_raw_container: String,
    /// Default container for processed chunk archives.
    pub blob_processed_container: String,
    /// Base URL of the remote document extraction service.
    pub extraction_endpoint: String,
    /// Optional API key for the extraction service.
    pub extraction_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible language model endpoint.
    pub llm_endpoint: String,
    /// Optional API key for the language model endpoint.
    pub llm_api_key: Option<String>,
    /// Chat model used for structured chunk generation.
    pub analysis_model: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the search service.
    pub search_endpoint: String,
    /// Optional admin API key for the search service.
    pub search_api_key: Option<String>,
    /// Name of the default search index documents are written to.
    pub search_index_name: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Per-request timeout applied to every outbound HTTP call, in seconds.
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            blob_endpoint: load_env("BLOB_ENDPOINT")?,
            blob_sas_token: load_env_optional("BLOB_SAS_TOKEN"),
            blob_raw_container: load_env_optional("BLOB_RAW_CONTAINER")
                .unwrap_or_else(|| "docpipe-raw".to_string()),
            blob_processed_container: load_env_optional("BLOB_PROCESSED_CONTAINER")
                .unwrap_or_else(|| "docpipe-processed".to_string()),
            extraction_endpoint: load_env("EXTRACTION_ENDPOINT")?,
            extraction_api_key: load_env_optional("EXTRACTION_API_KEY"),
            llm_endpoint: load_env("LLM_ENDPOINT")?,
            llm_api_key: load_env_optional("LLM_API_KEY"),
            analysis_model: load_env("ANALYSIS_MODEL")?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            search_endpoint: load_env("SEARCH_ENDPOINT")?,
            search_api_key: load_env_optional("SEARCH_API_KEY"),
            search_index_name: load_env("SEARCH_INDEX_NAME")?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            http_timeout_secs: load_env_optional("HTTP_TIMEOUT_SECS")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("HTTP_TIMEOUT_SECS".into()))
                })
                .transpose()?
                .unwrap_or(60),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        blob_endpoint = %config.blob_endpoint,
        search_endpoint = %config.search_endpoint,
        index = %config.search_index_name,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{CONFIG, Config};
    use std::sync::Once;

    /// Install a deterministic configuration for unit tests.
    pub(crate) fn ensure_test_config() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = CONFIG.set(Config {
                blob_endpoint: "http://127.0.0.1:10000/devstore".into(),
                blob_sas_token: None,
                blob_raw_container: "docpipe-raw".into(),
                blob_processed_container: "docpipe-processed".into(),
                extraction_endpoint: "http://127.0.0.1:5000".into(),
                extraction_api_key: None,
                llm_endpoint: "http://127.0.0.1:5001/v1".into(),
                llm_api_key: None,
                analysis_model: "test-analysis-model".into(),
                embedding_model: "test-embedding-model".into(),
                embedding_dimension: 4,
                search_endpoint: "http://127.0.0.1:5002".into(),
                search_api_key: None,
                search_index_name: "documents-index".into(),
                server_port: None,
                http_timeout_secs: 5,
            });
        });
    }
}
