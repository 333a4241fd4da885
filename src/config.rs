//! Configuration file parser for ~/.config/newsdesk/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, but logged as a warning in case of typos.
//! API keys may also come from the environment, which takes precedence.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const NEWS_API_KEY_ENV: &str = "NEWS_API_KEY";
pub const AI_API_KEY_ENV: &str = "OPENAI_API_KEY";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The custom Debug impl masks both API keys.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// newsapi.org key (alternative to the NEWS_API_KEY env var).
    pub news_api_key: Option<String>,

    /// Chat-completion API key (alternative to the OPENAI_API_KEY env var).
    pub ai_api_key: Option<String>,

    /// Two-letter country code sent with headline requests.
    pub country: String,

    pub news_base_url: String,

    pub ai_base_url: String,

    /// Chat model used for summaries, sentiment and insights.
    pub ai_model: String,

    /// Category shown when no selection has been saved yet.
    pub default_category: String,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Seconds between banner rotations.
    pub banner_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            news_api_key: None,
            ai_api_key: None,
            country: "us".to_string(),
            news_base_url: "https://newsapi.org".to_string(),
            ai_base_url: "https://api.openai.com".to_string(),
            ai_model: "gpt-3.5-turbo".to_string(),
            default_category: "General".to_string(),
            request_timeout_secs: 20,
            banner_interval_secs: 3,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field(
                "news_api_key",
                &self.news_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("country", &self.country)
            .field("news_base_url", &self.news_base_url)
            .field("ai_base_url", &self.ai_base_url)
            .field("ai_model", &self.ai_model)
            .field("default_category", &self.default_category)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("banner_interval_secs", &self.banner_interval_secs)
            .finish()
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "news_api_key",
        "ai_api_key",
        "country",
        "news_base_url",
        "ai_base_url",
        "ai_model",
        "default_category",
        "request_timeout_secs",
        "banner_interval_secs",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            country = %config.country,
            model = %config.ai_model,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// News API key: environment variable first, then config file.
    pub fn news_api_key(&self) -> Option<SecretString> {
        resolve_key(NEWS_API_KEY_ENV, self.news_api_key.as_deref())
    }

    /// AI API key: environment variable first, then config file.
    pub fn ai_api_key(&self) -> Option<SecretString> {
        resolve_key(AI_API_KEY_ENV, self.ai_api_key.as_deref())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn banner_interval(&self) -> Duration {
        Duration::from_secs(self.banner_interval_secs.max(1))
    }
}

fn resolve_key(env_var: &str, from_file: Option<&str>) -> Option<SecretString> {
    let from_env = std::env::var(env_var).ok();
    pick_key(from_env.as_deref(), from_file)
}

/// Env value wins over file value; blank values count as unset.
fn pick_key(from_env: Option<&str>, from_file: Option<&str>) -> Option<SecretString> {
    from_env
        .filter(|k| !k.trim().is_empty())
        .or(from_file.filter(|k| !k.trim().is_empty()))
        .map(|k| SecretString::from(k.trim().to_string()))
}

// ============================================================================
// Tests
// ============================================================================
