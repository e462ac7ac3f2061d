//! Environment-driven configuration for the Apex AI services.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.deepseek.com";
/// Default model for tool-calling chat.
pub const DEFAULT_CHAT_MODEL: &str = "deepseek-chat";
/// Default model for reasoning streams and keyword extraction.
pub const DEFAULT_REASONER_MODEL: &str = "deepseek-reasoner";
/// Default embeddings endpoint.
pub const DEFAULT_EMBEDDING_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "embedding-3";
/// Vector size produced by the default embedding model.
pub const DEFAULT_EMBEDDING_DIMS: usize = 2048;

/// System prompt used by the tool-calling chat route.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. You have access to a weather tool that provides current weather and a 7-day forecast. If the user asks for weather for a specific day (e.g., today, tomorrow, or a date within the next week), call `get_weather` for that city. Then, use the returned 7-day forecast data to find and report the weather for the specific day requested.";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A URL could not be parsed.
    #[error("invalid url for {name}: {source}")]
    InvalidUrl {
        /// Variable or field name.
        name: &'static str,
        /// Parse failure.
        #[source]
        source: url::ParseError,
    },
    /// A value is present but unusable.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Variable or field name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Convenience result alias for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat model settings.
    pub llm: LlmConfig,
    /// Embedding model settings.
    pub embedding: EmbeddingConfig,
    /// Vector store settings (RAG disabled when absent).
    pub chroma: Option<ChromaConfig>,
    /// Weather tool settings.
    pub weather: WeatherConfig,
    /// External MCP tool servers.
    pub mcp: McpConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load `.env` files and read the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unusable value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let llm_defaults = LlmConfig::default();
        let llm = LlmConfig {
            api_key: get("DEEPSEEK_API_KEY"),
            base_url: get("APEX_LLM_BASE_URL").unwrap_or(llm_defaults.base_url),
            chat_model: get("APEX_CHAT_MODEL").unwrap_or(llm_defaults.chat_model),
            reasoner_model: get("APEX_REASONER_MODEL").unwrap_or(llm_defaults.reasoner_model),
            system_prompt: get("APEX_SYSTEM_PROMPT").unwrap_or(llm_defaults.system_prompt),
            timeout: llm_defaults.timeout,
        };

        let embedding_defaults = EmbeddingConfig::default();
        let embedding = EmbeddingConfig {
            api_key: get("BIGMODEL_API_KEY"),
            base_url: get("APEX_EMBEDDING_BASE_URL").unwrap_or(embedding_defaults.base_url),
            model: get("APEX_EMBEDDING_MODEL").unwrap_or(embedding_defaults.model),
            batch_size: embedding_defaults.batch_size,
            ndims: embedding_defaults.ndims,
        };

        let chroma = match get("CHROMA_DB_URL") {
            Some(url) => Some(ChromaConfig::from_url(&url)?),
            None => None,
        };

        let weather_defaults = WeatherConfig::default();
        let weather = WeatherConfig {
            geocoding_url: get("APEX_WEATHER_GEOCODING_URL")
                .unwrap_or(weather_defaults.geocoding_url),
            forecast_url: get("APEX_WEATHER_FORECAST_URL").unwrap_or(weather_defaults.forecast_url),
            ..weather_defaults
        };

        let mcp = match get("APEX_MCP_SERVERS") {
            Some(raw) => McpConfig::parse(&raw)?,
            None => McpConfig::default(),
        };

        let server_defaults = ServerConfig::default();
        let port = match get("APEX_PORT") {
            Some(raw) => parse_port("APEX_PORT", &raw)?,
            None => server_defaults.port,
        };
        let server = ServerConfig {
            port,
            static_dir: get("APEX_STATIC_DIR").map_or(server_defaults.static_dir, PathBuf::from),
        };

        let config = Self {
            llm,
            embedding,
            chroma,
            weather,
            mcp,
            server,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any URL or model name is unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        parse_url("APEX_LLM_BASE_URL", &self.llm.base_url)?;
        parse_url("APEX_EMBEDDING_BASE_URL", &self.embedding.base_url)?;
        parse_url("APEX_WEATHER_GEOCODING_URL", &self.weather.geocoding_url)?;
        parse_url("APEX_WEATHER_FORECAST_URL", &self.weather.forecast_url)?;

        for (name, value) in [
            ("APEX_CHAT_MODEL", &self.llm.chat_model),
            ("APEX_REASONER_MODEL", &self.llm.reasoner_model),
            ("APEX_EMBEDDING_MODEL", &self.embedding.model),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    name,
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.embedding.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "embedding.batch_size",
                reason: "must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Default corpus location for ingestion.
pub const DEFAULT_INGEST_SOURCE: &str = "tmp/how-to-cook";

/// Settings for the recipe ingestion job and its HTTP wrapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Embedding model settings.
    pub embedding: EmbeddingConfig,
    /// Vector store the corpus is written to.
    pub chroma: ChromaConfig,
    /// Directory scanned for markdown recipes.
    pub source_dir: PathBuf,
    /// Listen port of the ingestion service.
    pub port: u16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            chroma: ChromaConfig::default(),
            source_dir: PathBuf::from(DEFAULT_INGEST_SOURCE),
            port: 3001,
        }
    }
}

impl IngestConfig {
    /// Load `.env` files and read the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable holds an unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the ingestion settings from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if a port or URL is unusable.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let embedding = EmbeddingConfig {
            api_key: get("BIGMODEL_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            base_url: get("APEX_EMBEDDING_BASE_URL").unwrap_or(defaults.embedding.base_url),
            model: get("APEX_EMBEDDING_MODEL").unwrap_or(defaults.embedding.model),
            batch_size: defaults.embedding.batch_size,
            ndims: defaults.embedding.ndims,
        };
        parse_url("APEX_EMBEDDING_BASE_URL", &embedding.base_url)?;

        let host = get("CHROMA_DB_HOST").unwrap_or_else(|| defaults.chroma.host.clone());
        let chroma_port = match get("CHROMA_DB_PORT") {
            Some(raw) => parse_port("CHROMA_DB_PORT", &raw)?,
            None => defaults.chroma.port,
        };
        let port = match get("PORT") {
            Some(raw) => parse_port("PORT", &raw)?,
            None => defaults.port,
        };

        Ok(Self {
            embedding,
            chroma: ChromaConfig::from_host_port(&host, chroma_port),
            source_dir: defaults.source_dir,
            port,
        })
    }
}

fn parse_port(name: &'static str, raw: &str) -> ConfigResult<u16> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name,
        reason: format!("'{raw}' is not a port number"),
    })
}

/// Load `.env` from the workspace root and the current directory.
pub fn load_dotenv() {
    let _ = dotenvy::from_path("../../.env");
    let _ = dotenvy::dotenv();
}

fn parse_url(name: &'static str, value: &str) -> ConfigResult<Url> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

/// Chat completion endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Bearer token for the endpoint.
    pub api_key: Option<String>,
    /// Base URL (without `/chat/completions`).
    pub base_url: String,
    /// Model used for tool-calling chat.
    pub chat_model: String,
    /// Model used for reasoning streams.
    pub reasoner_model: String,
    /// System prompt prepended to chat conversations.
    pub system_prompt: String,
    /// Limit for a whole non-streaming call, and for the gap between two
    /// chunks of a stream.
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            reasoner_model: DEFAULT_REASONER_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Embedding endpoint settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Bearer token for the endpoint.
    pub api_key: Option<String>,
    /// Base URL (without `/embeddings`).
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
    /// Max strings per request.
    pub batch_size: usize,
    /// Vector size returned by `model`.
    pub ndims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_EMBEDDING_BASE_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            batch_size: 64,
            ndims: DEFAULT_EMBEDDING_DIMS,
        }
    }
}

/// Chroma connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromaConfig {
    /// Host name.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Use HTTPS.
    pub ssl: bool,
    /// Tenant name.
    pub tenant: String,
    /// Database name.
    pub database: String,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            ssl: false,
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
        }
    }
}

impl ChromaConfig {
    /// Build from a URL such as `https://chroma.example.com` or `http://localhost:8000`.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed or has no host.
    pub fn from_url(raw: &str) -> ConfigResult<Self> {
        let url = parse_url("CHROMA_DB_URL", raw)?;
        let ssl = url.scheme() == "https";
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidValue {
                name: "CHROMA_DB_URL",
                reason: "missing host".to_string(),
            })?
            .to_string();
        let port = url.port().unwrap_or(if ssl { 443 } else { 80 });
        Ok(Self {
            host,
            port,
            ssl,
            ..Self::default()
        })
    }

    /// Build from separate host and port values.
    #[must_use]
    pub fn from_host_port(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            ..Self::default()
        }
    }

    /// Base URL of the server, e.g. `http://localhost:8000`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Weather tool settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Geocoding API base URL.
    pub geocoding_url: String,
    /// Forecast API base URL.
    pub forecast_url: String,
    /// Whether results are cached.
    pub cache_enabled: bool,
    /// Cache TTL in seconds.
    pub cache_ttl_seconds: u64,
    /// Maximum number of cached cities.
    pub cache_max_entries: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com".to_string(),
            forecast_url: "https://api.open-meteo.com".to_string(),
            cache_enabled: true,
            cache_ttl_seconds: 600,
            cache_max_entries: 256,
        }
    }
}

/// How to reach an MCP server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum McpTarget {
    /// Spawn a child process speaking MCP over stdio.
    Stdio {
        /// Program to run.
        command: String,
        /// Program arguments.
        args: Vec<String>,
    },
    /// Streamable-HTTP endpoint.
    Http {
        /// Endpoint URL, e.g. `http://localhost:3001/mcp`.
        url: String,
    },
}

/// A named MCP server entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerEntry {
    /// Display name used in logs.
    pub name: String,
    /// Connection target.
    pub target: McpTarget,
}

/// External MCP servers whose tools are offered to the chat model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Configured servers, in registration order.
    pub servers: Vec<McpServerEntry>,
}

impl McpConfig {
    /// Parse `name=target;name=target`.
    ///
    /// # Errors
    /// Returns an error for entries without a name or target, or with a bad URL.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let mut servers = Vec::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, target) = entry.split_once('=').ok_or_else(|| invalid_mcp(entry))?;
            let name = name.trim();
            let target = target.trim();
            if name.is_empty() || target.is_empty() {
                return Err(invalid_mcp(entry));
            }

            let target = if target.starts_with("http://") || target.starts_with("https://") {
                parse_url("APEX_MCP_SERVERS", target)?;
                McpTarget::Http {
                    url: target.to_string(),
                }
            } else {
                let mut parts = target.split_whitespace().map(str::to_string);
                let command = parts.next().ok_or_else(|| invalid_mcp(entry))?;
                McpTarget::Stdio {
                    command,
                    args: parts.collect(),
                }
            };

            servers.push(McpServerEntry {
                name: name.to_string(),
                target,
            });
        }
        Ok(Self { servers })
    }
}

fn invalid_mcp(entry: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: "APEX_MCP_SERVERS",
        reason: format!("expected name=target, got '{entry}'"),
    }
}

/// HTTP server settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// Directory holding the static pages.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            static_dir: PathBuf::from("static"),
        }
    }
}
