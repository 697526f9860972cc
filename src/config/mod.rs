use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::index::OpenAiEmbedder;
use crate::repositories::validate_table_name;
use crate::services::discovery_service::{DEFAULT_TOP_K, MAX_TOP_K};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/registry.db";
pub const DEFAULT_TABLE: &str = "mcp_servers";
pub const DEFAULT_EMBEDDING_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which embedding backend the Search Index uses.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingConfig {
    /// Local hashing embedder, no network.
    Hashing,
    OpenAi {
        api_url: String,
        api_key: String,
        model: String,
        dimensions: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub table: String,
    pub use_memory_store: bool,
    pub embedding: EmbeddingConfig,
    pub introspection_timeout: Duration,
    pub backend_timeout: Duration,
    pub search_top_k: usize,
    pub search_min_score: f32,
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Unset and empty values
    /// fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let table = get("REGISTRY_TABLE").unwrap_or_else(|| DEFAULT_TABLE.to_string());
        if validate_table_name(&table).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "REGISTRY_TABLE",
                value: table,
                reason: "must be a SQL identifier".to_string(),
            });
        }

        let api_key = get("EMBEDDING_API_KEY").or_else(|| get("OPENAI_API_KEY"));
        let embedding = match api_key {
            Some(api_key) => {
                let model =
                    get("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());
                let dimensions = parse_or(
                    &get,
                    "EMBEDDING_DIMENSIONS",
                    OpenAiEmbedder::default_dimensions(&model),
                )?;
                if dimensions == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "EMBEDDING_DIMENSIONS",
                        value: dimensions.to_string(),
                        reason: "must be positive".to_string(),
                    });
                }

                EmbeddingConfig::OpenAi {
                    api_url: get("EMBEDDING_API_URL")
                        .unwrap_or_else(|| DEFAULT_EMBEDDING_API_URL.to_string()),
                    api_key,
                    model,
                    dimensions,
                }
            }
            None => EmbeddingConfig::Hashing,
        };

        let search_top_k = parse_or(&get, "SEARCH_TOP_K", DEFAULT_TOP_K)?;
        if !(1..=MAX_TOP_K).contains(&search_top_k) {
            return Err(ConfigError::InvalidValue {
                key: "SEARCH_TOP_K",
                value: search_top_k.to_string(),
                reason: format!("must be between 1 and {}", MAX_TOP_K),
            });
        }

        let search_min_score: f32 = parse_or(&get, "SEARCH_MIN_SCORE", 0.0)?;
        if !search_min_score.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "SEARCH_MIN_SCORE",
                value: search_min_score.to_string(),
                reason: "must be a finite number".to_string(),
            });
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "PORT", 8080)?,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            table,
            use_memory_store: get("USE_MEMORY_STORE")
                .map(|value| flag_enabled(&value))
                .unwrap_or(false),
            embedding,
            introspection_timeout: timeout_secs(&get, "INTROSPECTION_TIMEOUT_SECS")?,
            backend_timeout: timeout_secs(&get, "BACKEND_TIMEOUT_SECS")?,
            search_top_k,
            search_min_score,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "HOST",
                value: self.host.clone(),
                reason: e.to_string(),
            })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                reason: e.to_string(),
                value,
            }),
        None => Ok(default),
    }
}

/// Whole seconds, at least one. Defaults to five.
fn timeout_secs<G>(get: &G, key: &'static str) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match parse_or(get, key, 5)? {
        0 => Err(ConfigError::InvalidValue {
            key,
            value: "0".to_string(),
            reason: "must be at least 1 second".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn flag_enabled(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "True")
}
