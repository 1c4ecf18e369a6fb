use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

use crate::constants::DEFAULT_MAX_BODY_BYTES;

/// Startup-time configuration failures. These abort the process.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("OPENROUTER_BASE_URL must be set")]
    MissingBaseUrl,

    #[error("Invalid upstream base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Upstream base URL {0:?} has no host")]
    BaseUrlWithoutHost(String),
}

/// Upstream provider settings. Immutable after load.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub base_url: Url,
    pub api_key: Option<String>,
    pub model_mappings: HashMap<String, String>,
    /// Inject `include_reasoning` and rewrite `reasoning` in SSE data lines
    pub enable_reasoning: bool,
    pub rankings_title: Option<String>,
    pub rankings_url: Option<String>,
    /// Dump outbound requests, buffered responses and streamed lines
    pub debug: bool,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw_url = var("OPENROUTER_BASE_URL").ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
            url: raw_url.clone(),
            source,
        })?;
        if base_url.host_str().is_none() {
            return Err(ConfigError::BaseUrlWithoutHost(raw_url));
        }

        let model_mappings = match var("OPENROUTER_MODEL_MAPPINGS") {
            Some(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    tracing::error!("Ignoring malformed OPENROUTER_MODEL_MAPPINGS: {e}");
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };

        Ok(Self {
            base_url,
            api_key: var("OPENROUTER_API_KEY"),
            model_mappings,
            enable_reasoning: var("OPENROUTER_ENABLE_OUTPUT_REASON").as_deref() == Some("true"),
            rankings_title: var("OPENROUTER_RANKINGS_TITLE"),
            rankings_url: var("OPENROUTER_RANKINGS_URL"),
            debug: var("OPENROUTER_DEBUG")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

pub struct Config {
    pub host: String,
    pub port: u16,
    /// Key clients must present as `Authorization: Bearer <key>`; `None` disables the check
    pub api_key: Option<String>,
    pub web_root: Option<PathBuf>,
    pub max_body_bytes: usize,
    pub upstream_timeout: Option<Duration>,
    pub proxy: ProxyConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let host = env::var("RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("RELAY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let api_key = env::var("RELAY_API_KEY").ok().filter(|k| !k.is_empty());
        let web_root = env::var("RELAY_WEB_ROOT")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let max_body_bytes = env::var("RELAY_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let upstream_timeout = env::var("UPSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            host,
            port,
            api_key,
            web_root,
            max_body_bytes,
            upstream_timeout,
            proxy: ProxyConfig::from_env()?,
        })
    }
}
