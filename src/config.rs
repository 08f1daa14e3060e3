use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::entry::RecordKind;

/// TLS handshake (connect) timeout applied to every client.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECONDS: u64 = 10;
/// Overall timeout of a proxied page-sitemap request.
pub const DEFAULT_PAGE_TIMEOUT_SECONDS: u64 = 20;
/// Overall timeout of a proxied sitemap-index request. Index documents are
/// given three times as long as page sitemaps.
pub const DEFAULT_INDEX_TIMEOUT_SECONDS: u64 = 60;
/// Overall timeout of the direct request, including the fallback attempt.
pub const DEFAULT_DIRECT_TIMEOUT_SECONDS: u64 = 20;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// What to do with a `<priority>` outside `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriorityPolicy {
    /// Fail the record with a validation error.
    #[default]
    Reject,
    /// Clamp the value into range and keep the record.
    Clamp,
}

impl FromStr for PriorityPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(PriorityPolicy::Reject),
            "clamp" => Ok(PriorityPolicy::Clamp),
            other => Err(format!("unknown priority policy: {other}")),
        }
    }
}

/// What to do with a `<changefreq>` token outside the protocol's set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFrequencyPolicy {
    /// Treat the field as absent.
    #[default]
    Ignore,
    /// Fail the record with a validation error.
    Reject,
}

impl FromStr for UnknownFrequencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(UnknownFrequencyPolicy::Ignore),
            "reject" => Ok(UnknownFrequencyPolicy::Reject),
            other => Err(format!("unknown change frequency policy: {other}")),
        }
    }
}

/// Field validation rules and diagnostics for the parse engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ParseOptions {
    pub priority_policy: PriorityPolicy,
    pub unknown_frequency: UnknownFrequencyPolicy,
    /// Log every raw chunk read from the source at TRACE level
    pub trace_payload: bool,
}

/// Timeouts and transport trust settings for retrieval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Connect + TLS handshake timeout in seconds
    pub tls_handshake_timeout_seconds: u64,
    /// Overall timeout of a proxied page-sitemap request in seconds
    pub page_timeout_seconds: u64,
    /// Overall timeout of a proxied sitemap-index request in seconds
    pub index_timeout_seconds: u64,
    /// Overall timeout of a direct request in seconds
    pub direct_timeout_seconds: u64,
    /// Skip certificate verification (off unless explicitly enabled)
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            tls_handshake_timeout_seconds: DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECONDS,
            page_timeout_seconds: DEFAULT_PAGE_TIMEOUT_SECONDS,
            index_timeout_seconds: DEFAULT_INDEX_TIMEOUT_SECONDS,
            direct_timeout_seconds: DEFAULT_DIRECT_TIMEOUT_SECONDS,
            accept_invalid_certs: false,
        }
    }
}

impl FetchConfig {
    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_timeout_seconds)
    }

    /// Overall timeout of a proxied request for the given document kind.
    pub fn proxied_timeout_seconds(&self, kind: RecordKind) -> u64 {
        match kind {
            RecordKind::Page => self.page_timeout_seconds,
            RecordKind::Index => self.index_timeout_seconds,
        }
    }
}

/// Library configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub parse: ParseOptions,
    pub fetch: FetchConfig,
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: defaults -> file -> environment
    pub fn load_config(path: Option<&Path>) -> Result<Config> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Config::default(),
        };

        let config = Self::apply_environment_overrides(config)?;
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        // Fetch settings
        if let Some(value) = env_value(env, "SITEMAP_STREAM_TLS_HANDSHAKE_TIMEOUT")? {
            config.fetch.tls_handshake_timeout_seconds = value;
        }
        if let Some(value) = env_value(env, "SITEMAP_STREAM_PAGE_TIMEOUT")? {
            config.fetch.page_timeout_seconds = value;
        }
        if let Some(value) = env_value(env, "SITEMAP_STREAM_INDEX_TIMEOUT")? {
            config.fetch.index_timeout_seconds = value;
        }
        if let Some(value) = env_value(env, "SITEMAP_STREAM_DIRECT_TIMEOUT")? {
            config.fetch.direct_timeout_seconds = value;
        }
        if let Some(value) = env_value(env, "SITEMAP_STREAM_ACCEPT_INVALID_CERTS")? {
            config.fetch.accept_invalid_certs = value;
        }

        // Parse settings
        if let Some(value) = env_value(env, "SITEMAP_STREAM_PRIORITY_POLICY")? {
            config.parse.priority_policy = value;
        }
        if let Some(value) = env_value(env, "SITEMAP_STREAM_UNKNOWN_FREQUENCY")? {
            config.parse.unknown_frequency = value;
        }
        if let Some(value) = env_value(env, "SITEMAP_STREAM_TRACE_PAYLOAD")? {
            config.parse.trace_payload = value;
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        let timeouts = [
            (
                "tls_handshake_timeout_seconds",
                config.fetch.tls_handshake_timeout_seconds,
            ),
            ("page_timeout_seconds", config.fetch.page_timeout_seconds),
            ("index_timeout_seconds", config.fetch.index_timeout_seconds),
            ("direct_timeout_seconds", config.fetch.direct_timeout_seconds),
        ];

        for (name, seconds) in timeouts {
            if seconds == 0 {
                return Err(ConfigError::Validation(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        Ok(())
    }
}

fn env_value<T: FromStr>(env: &impl EnvProvider, key: &str) -> Result<Option<T>> {
    env.get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::Environment(format!("Invalid {key} value: {raw}")))
        })
        .transpose()
}
