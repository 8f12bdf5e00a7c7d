//! Bot configuration.
//!
//! Configuration is read from `~/.lingua-bot/config.json` (or an explicit
//! path) and then overlaid with environment variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `TELEGRAM_TOKEN` (fallback `TELEGRAM_BOT_TOKEN`) | `telegram.token` |
//! | `GROQ_API_KEY` | `groq.api_key` |
//! | `GROQ_BASE_URL` | `groq.base_url` |
//! | `LINGUA_MODEL` | `tutor.model` |

use crate::error::{ConfigError, ConfigResult};
use crate::session::SessionConfig;
use crate::tutor::TutorConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable holding the Telegram bot token.
pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_TOKEN";
/// Fallback environment variable for the Telegram bot token.
pub const TELEGRAM_TOKEN_FALLBACK_ENV: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable holding the Groq API key.
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";
/// Environment variable overriding the Groq base URL.
pub const GROQ_BASE_URL_ENV: &str = "GROQ_BASE_URL";
/// Environment variable overriding the completion model.
pub const MODEL_ENV: &str = "LINGUA_MODEL";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Telegram transport.
    pub telegram: TelegramConfig,
    /// Groq completion provider.
    pub groq: GroqConfig,
    /// Tutor behaviour.
    pub tutor: TutorConfig,
    /// Session store.
    pub session: SessionConfig,
}

/// Telegram transport settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Whether `run` starts the Telegram channel.
    pub enabled: bool,
    /// Bot token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: None,
        }
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("enabled", &self.enabled)
            .field("token", &redact(self.token.as_deref()))
            .finish()
    }
}

/// Groq provider settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroqConfig {
    /// API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

impl fmt::Debug for GroqConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroqConfig")
            .field("api_key", &redact(self.api_key.as_deref()))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

const fn redact(secret: Option<&str>) -> Option<&'static str> {
    match secret {
        Some(_) => Some("<redacted>"),
        None => None,
    }
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The bot runs, but some feature is degraded.
    Warning,
    /// The bot cannot run with this configuration.
    Error,
}

/// A problem found by [`BotConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Dotted field path, e.g. `groq.api_key`.
    pub field: String,
    /// Human-readable description.
    pub message: String,
}

impl ConfigIssue {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            field: field.to_string(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            IssueLevel::Warning => "warning",
            IssueLevel::Error => "error",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

impl BotConfig {
    /// Overlay values from the process environment.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    #[must_use]
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(token) = get(TELEGRAM_TOKEN_ENV).or_else(|| get(TELEGRAM_TOKEN_FALLBACK_ENV)) {
            self.telegram.token = Some(token);
        }
        if let Some(key) = get(GROQ_API_KEY_ENV) {
            self.groq.api_key = Some(key);
        }
        if let Some(url) = get(GROQ_BASE_URL_ENV) {
            self.groq.base_url = Some(url);
        }
        if let Some(model) = get(MODEL_ENV) {
            self.tutor.model = model;
        }
        self
    }

    /// The Telegram token, required to start the Telegram transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when no token is configured.
    pub fn telegram_token(&self) -> ConfigResult<&str> {
        self.telegram
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::missing(format!("telegram.token ({TELEGRAM_TOKEN_ENV})")))
    }

    /// Check that `lingua run` has a transport to start. Called before any
    /// transport is created.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when Telegram is enabled without a
    /// token, and [`ConfigError::Invalid`] when Telegram is disabled and the
    /// terminal transport was not requested either.
    pub fn check_run(&self, with_cli: bool) -> ConfigResult<()> {
        if self.telegram.enabled {
            self.telegram_token()?;
        } else if !with_cli {
            return Err(ConfigError::invalid(
                "telegram is disabled and --cli was not given; nothing to run",
            ));
        }
        Ok(())
    }

    /// Check the configuration for problems.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.telegram.enabled && self.telegram_token().is_err() {
            issues.push(ConfigIssue::error(
                "telegram.token",
                format!("Telegram is enabled but no token is set; export {TELEGRAM_TOKEN_ENV}"),
            ));
        }
        if self.groq.api_key.as_deref().is_none_or(str::is_empty) {
            issues.push(ConfigIssue::warning(
                "groq.api_key",
                format!("no API key; every tutor reply will be an apology. Export {GROQ_API_KEY_ENV}"),
            ));
        }
        if self.groq.timeout_secs == 0 {
            issues.push(ConfigIssue::error("groq.timeout_secs", "must be greater than 0"));
        }
        if self.tutor.model.trim().is_empty() {
            issues.push(ConfigIssue::error("tutor.model", "must not be empty"));
        }
        if self.tutor.history_window == 0 {
            issues.push(ConfigIssue::warning(
                "tutor.history_window",
                "0 disables conversation memory",
            ));
        }
        if self.session.max_history_length % 2 == 1 {
            issues.push(ConfigIssue::warning(
                "session.max_history_length",
                format!(
                    "odd limit; whole exchanges are kept, so at most {} messages are stored",
                    self.session.max_history_length - 1
                ),
            ));
        }
        if self.session.max_history_length < self.tutor.history_window {
            issues.push(ConfigIssue::error(
                "session.max_history_length",
                format!(
                    "{} is smaller than tutor.history_window ({})",
                    self.session.max_history_length, self.tutor.history_window
                ),
            ));
        }

        issues
    }

    /// Whether [`validate`](Self::validate) reports any error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.validate().iter().any(|i| i.level == IssueLevel::Error)
    }
}

/// How to provide the Telegram token, for startup diagnostics.
#[must_use]
pub fn token_help() -> String {
    format!(
        "Set {TELEGRAM_TOKEN_ENV} (or {TELEGRAM_TOKEN_FALLBACK_ENV}) in the environment or a .env file."
    )
}

/// Directory holding the configuration file.
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".lingua-bot")
}

/// Default configuration file path.
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Load configuration from `path`, or from [`config_path`] when `None`.
///
/// A missing default file yields the default configuration; a missing
/// explicit file is an error. Environment variables are not applied.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not valid JSON.
pub async fn load_config(path: Option<&Path>) -> ConfigResult<BotConfig> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (config_path(), false),
    };

    if !explicit && !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(BotConfig::default());
    }

    let content = tokio::fs::read_to_string(&path).await?;
    let config = serde_json::from_str(&content)?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Write `config` to `path` as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn save_config(config: &BotConfig, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, content).await?;
    info!(path = %path.display(), "config saved");
    Ok(())
}

/// Write a default configuration to `path`.
///
/// Returns `false` without writing if the file exists and `force` is not set.
///
/// # Errors
///
/// Returns an error if the write fails.
pub async fn init_config(path: &Path, force: bool) -> ConfigResult<bool> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(false);
    }
    save_config(&BotConfig::default(), path).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tutor::HistoryPolicy;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert!(config.telegram.enabled);
        assert_eq!(config.groq.timeout_secs, 60);
        assert_eq!(config.tutor.model, "llama-3.1-8b-instant");
        assert_eq!(config.tutor.history_window, 4);
        assert_eq!(config.tutor.history_policy, HistoryPolicy::PracticeOnly);
        assert_eq!(config.session.max_history_length, 20);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: BotConfig = serde_json::from_str(
            r#"{"tutor": {"history_policy": "always"}, "groq": {"timeout_secs": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.tutor.history_policy, HistoryPolicy::Always);
        assert_eq!(config.tutor.native_language, "Spanish");
        assert_eq!(config.groq.timeout_secs, 5);
        assert!(config.telegram.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let config = BotConfig::default().with_env_from(env(&[
            ("TELEGRAM_TOKEN", "tg"),
            ("GROQ_API_KEY", "gsk"),
            ("LINGUA_MODEL", "llama-3.3-70b-versatile"),
        ]));
        assert_eq!(config.telegram_token().unwrap(), "tg");
        assert_eq!(config.groq.api_key.as_deref(), Some("gsk"));
        assert_eq!(config.tutor.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_token_fallback_and_empty_values() {
        let config = BotConfig::default()
            .with_env_from(env(&[("TELEGRAM_TOKEN", " "), ("TELEGRAM_BOT_TOKEN", "fallback")]));
        assert_eq!(config.telegram_token().unwrap(), "fallback");
    }

    #[test]
    fn test_missing_token() {
        let config = BotConfig::default().with_env_from(env(&[]));
        assert!(matches!(config.telegram_token(), Err(ConfigError::Missing(_))));
        assert!(config.has_errors());
    }

    #[test]
    fn test_run_needs_a_transport() {
        let config = BotConfig::default().with_env_from(env(&[]));
        assert!(matches!(config.check_run(false), Err(ConfigError::Missing(_))));
        // The terminal does not replace a missing token while Telegram is on.
        assert!(matches!(config.check_run(true), Err(ConfigError::Missing(_))));

        let mut config = config;
        config.telegram.enabled = false;
        assert!(matches!(config.check_run(false), Err(ConfigError::Invalid(_))));
        assert!(config.check_run(true).is_ok());

        let config = BotConfig::default().with_env_from(env(&[("TELEGRAM_TOKEN", "tg")]));
        assert!(config.check_run(false).is_ok());
    }

    #[test]
    fn test_missing_token_diagnostic() {
        let config = BotConfig::default().with_env_from(env(&[]));
        let err = config.check_run(false).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_TOKEN"));

        let help = token_help();
        assert!(help.contains("TELEGRAM_TOKEN"));
        assert!(help.contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn test_odd_history_limit_warns() {
        let mut config = BotConfig::default().with_env_from(env(&[
            ("TELEGRAM_TOKEN", "tg"),
            ("GROQ_API_KEY", "gsk"),
        ]));
        config.session.max_history_length = 21;

        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, IssueLevel::Warning);
        assert!(issues[0].message.contains("20"));
    }

    #[test]
    fn test_validate() {
        let mut config = BotConfig::default().with_env_from(env(&[
            ("TELEGRAM_TOKEN", "tg"),
            ("GROQ_API_KEY", "gsk"),
        ]));
        assert!(config.validate().is_empty());

        config.session.max_history_length = 2;
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, IssueLevel::Error);
        assert_eq!(issues[0].field, "session.max_history_length");

        config.session.max_history_length = 20;
        config.groq.api_key = None;
        let issues = config.validate();
        assert_eq!(issues[0].level, IssueLevel::Warning);
        assert!(!config.has_errors());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = BotConfig::default()
            .with_env_from(env(&[("TELEGRAM_TOKEN", "123:secret"), ("GROQ_API_KEY", "gsk_x")]));
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(!debug.contains("gsk_x"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("lingua-bot-{}", crate::util::generate_message_id()));
        let path = dir.join("config.json");

        assert!(init_config(&path, false).await.unwrap());
        assert!(!init_config(&path, false).await.unwrap());

        let mut config = load_config(Some(&path)).await.unwrap();
        config.tutor.target_language = "French".to_string();
        save_config(&config, &path).await.unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.tutor.target_language, "French");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_explicit_missing_file_is_error() {
        let path = std::env::temp_dir().join("lingua-bot-does-not-exist.json");
        assert!(matches!(load_config(Some(&path)).await, Err(ConfigError::Io(_))));
    }
}
