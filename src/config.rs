use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};
use crate::logging::LogFormat;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub model: ModelConfig,
    pub fetch: FetchConfig,
    pub log_format: LogFormat,
}

/// Which pretrained model the summarizer is built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelConfig {
    pub model_id: String,
    pub revision: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: "t5-small".to_string(),
            // the main branch of t5-small predates its safetensors weights
            revision: "refs/pr/15".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to
    /// defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let defaults = ModelConfig::default();
        let model = ModelConfig {
            model_id: lookup("SUMMARIZER_MODEL").unwrap_or(defaults.model_id),
            revision: lookup("SUMMARIZER_REVISION").unwrap_or(defaults.revision),
        };

        let defaults = FetchConfig::default();
        let fetch = FetchConfig {
            timeout: parse_secs(&lookup, "FETCH_TIMEOUT_SECS")?.unwrap_or(defaults.timeout),
            connect_timeout: parse_secs(&lookup, "FETCH_CONNECT_TIMEOUT_SECS")?
                .unwrap_or(defaults.connect_timeout),
            user_agent: lookup("FETCH_USER_AGENT").unwrap_or(defaults.user_agent),
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::Text,
        };

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            model,
            fetch,
            log_format,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e)))
        })
        .transpose()
}
