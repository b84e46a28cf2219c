use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::SummaryError;

/// Smallest lookback window the analytics source accepts, in days.
pub const MIN_DAYS: u32 = 1;
/// Largest lookback window the analytics source accepts, in days.
pub const MAX_DAYS: u32 = 50;

const BASE_URL: &str = "https://promptly-backend-wwdj.onrender.com";

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default lookback window in days.
    pub days: u32,
    pub source: SourceConfig,
    pub selection: SelectionConfig,
    pub provider: ProviderConfig,
    pub publish: PublishConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            days: 7,
            source: SourceConfig::default(),
            selection: SelectionConfig::default(),
            provider: ProviderConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path,
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default config file path (`<config_dir>/promptly-summary/config.toml`).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("promptly-summary")
            .join("config.toml")
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SummaryError> {
        if !(MIN_DAYS..=MAX_DAYS).contains(&self.days) {
            return Err(SummaryError::Config(format!(
                "days must be between {} and {}, got {}",
                MIN_DAYS, MAX_DAYS, self.days
            )));
        }
        if self.selection.top_n == 0 {
            return Err(SummaryError::Config("selection.top_n must be > 0".into()));
        }
        if self.selection.max_prompt_length == 0 {
            return Err(SummaryError::Config(
                "selection.max_prompt_length must be > 0".into(),
            ));
        }
        if self.source.timeout_secs == 0 {
            return Err(SummaryError::Config(
                "source.timeout_secs must be > 0".into(),
            ));
        }
        if self.publish.timeout_secs == 0 {
            return Err(SummaryError::Config(
                "publish.timeout_secs must be > 0".into(),
            ));
        }
        check_url("source.url", &self.source.url)?;
        check_url("publish.dashboard_url", &self.publish.dashboard_url)?;
        check_url("provider.api_base", &self.provider.api_base)?;
        Ok(())
    }
}

fn check_url(field: &str, raw: &str) -> Result<(), SummaryError> {
    let parsed =
        Url::parse(raw).map_err(|e| SummaryError::Config(format!("{}: invalid URL: {}", field, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SummaryError::Config(format!(
            "{}: scheme '{}' is not allowed (only http/https)",
            field, other
        ))),
    }
}

/// Analytics source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Endpoint returning the prompt history as JSON.
    pub url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: format!("{}/prompt-history", BASE_URL),
            timeout_secs: 15,
        }
    }
}

/// How entries are chosen for the aggregate metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of most-improved entries kept.
    pub top_n: usize,
    /// Entries with a longer original or improved prompt are dropped (characters).
    pub max_prompt_length: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            max_prompt_length: 1000,
        }
    }
}

/// Which generation API the provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Messages API, streamed.
    Anthropic,
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAi,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Base URL of the API.
    pub api_base: String,
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Anthropic,
            api_base: "https://api.anthropic.com".into(),
            model: "claude-opus-4-1-20250805".into(),
            max_tokens: 32_000,
            temperature: 1.0,
            api_key_env: "ANTHROPIC_API_KEY".into(),
        }
    }
}

/// Publish destinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Dashboard endpoint; always configured.
    pub dashboard_url: String,
    /// Environment variable holding the chat webhook URL.
    pub chat_webhook_env: String,
    /// Abort instead of skipping when the chat webhook is missing.
    pub require_chat: bool,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dashboard_url: format!("{}/set-weekly-update", BASE_URL),
            chat_webhook_env: "SLACK_WEBHOOK".into(),
            require_chat: false,
            timeout_secs: 15,
        }
    }
}

/// Secrets resolved once at startup and handed to constructors.
#[derive(Clone, Default)]
pub struct Credentials {
    pub generation_key: Option<String>,
    /// The webhook URL is itself the credential.
    pub chat_webhook: Option<String>,
}

impl Credentials {
    /// Read credentials from the environment variables named in `config`.
    pub fn from_env(config: &AppConfig) -> Self {
        Self {
            generation_key: non_empty_env(&config.provider.api_key_env),
            chat_webhook: non_empty_env(&config.publish.chat_webhook_env),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("generation_key", &self.generation_key.as_ref().map(|_| "<redacted>"))
            .field("chat_webhook", &self.chat_webhook.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
