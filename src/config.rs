use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

pub const TOKEN_ENV: &str = "POLLBOT_TOKEN";
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PollbotConfig {
    pub telegram: TelegramCfg,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub log: LogCfg,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramCfg {
    pub token: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// `getUpdates` batch size, 1..=100. Server default when unset.
    pub limit: Option<u8>,
    pub allowed_updates: Option<Vec<String>>,
}

/// Read once per [`Bot::start`](crate::bot::Bot::start).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PollConfig {
    pub workers: NonZeroUsize,
    /// Long-poll timeout in seconds; 0 means short polling.
    pub timeout: u32,
    /// Log a warning each time the handler backlog grows by this many jobs. 0 disables it.
    pub queue_warn_threshold: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LogCfg {
    pub dir: Option<PathBuf>,
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_log_file() -> String {
    "pollbot.log".to_string()
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            workers: NonZeroUsize::new(4).unwrap_or(NonZeroUsize::MIN),
            timeout: 0,
            queue_warn_threshold: 1000,
        }
    }
}

impl Default for LogCfg {
    fn default() -> Self {
        LogCfg {
            dir: None,
            file: default_log_file(),
        }
    }
}

impl TelegramCfg {
    pub fn new(token: impl Into<String>) -> Self {
        TelegramCfg {
            token: Some(token.into()),
            api_url: default_api_url(),
            limit: None,
            allowed_updates: None,
        }
    }

    /// Token from the config file, falling back to `POLLBOT_TOKEN`.
    pub fn resolve_token(&self) -> anyhow::Result<String> {
        match &self.token {
            Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => std::env::var(TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty())
                .with_context(|| format!("no telegram token in config and {TOKEN_ENV} is unset")),
        }
    }
}

impl PollbotConfig {
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let config: PollbotConfig = toml::from_str(raw).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(limit) = self.telegram.limit {
            if !(1..=100).contains(&limit) {
                bail!("telegram.limit must be within 1..=100, got {limit}");
            }
        }
        if self.telegram.api_url.trim().is_empty() {
            bail!("telegram.api_url cannot be empty");
        }
        Ok(())
    }
}

pub fn load(path: &Path) -> anyhow::Result<PollbotConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    PollbotConfig::from_toml(&raw)
}
