//! Application config loaded from the environment (`.env` is loaded by the binary first).

use crate::auth::AllowList;
use crate::feed::FeedSettings;
use anyhow::{Context, Result};
use relay_telegram::TelegramConfig;
use std::env;
use std::time::Duration;

pub const DEFAULT_LOG_FILE: &str = "logs/relay-bot.log";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_AI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_EDIT_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_TYPING_INTERVAL_SECS: u64 = 10;

/// Everything `run_bot` needs: Telegram connection, backend, debounce delays, allow-list.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub telegram: TelegramConfig,
    pub log_file: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub ai_model: String,
    pub ai_system_prompt: Option<String>,
    pub edit_interval: Duration,
    pub typing_interval: Duration,
    pub allow_list: AllowList,
}

fn parse_u64(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", name, raw)),
        _ => Ok(default),
    }
}

impl RelayConfig {
    /// Loads from env. `token` overrides BOT_TOKEN when provided.
    pub fn load(token: Option<String>) -> Result<Self> {
        let telegram = TelegramConfig::from_env(token)?;
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
        let openai_api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let openai_base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        let ai_model = env::var("AI_MODEL").unwrap_or_else(|_| DEFAULT_AI_MODEL.to_string());
        let ai_system_prompt = env::var("AI_SYSTEM_PROMPT")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let edit_interval =
            Duration::from_millis(parse_u64("EDIT_INTERVAL_MS", DEFAULT_EDIT_INTERVAL_MS)?);
        let typing_interval =
            Duration::from_secs(parse_u64("TYPING_INTERVAL_SECS", DEFAULT_TYPING_INTERVAL_SECS)?);
        let allow_list = AllowList::parse(&env::var("ALLOWED_USERS").unwrap_or_default())?;

        Ok(Self {
            telegram,
            log_file,
            openai_api_key,
            openai_base_url,
            ai_model,
            ai_system_prompt,
            edit_interval,
            typing_interval,
            allow_list,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.telegram.validate()?;
        if self.openai_api_key.trim().is_empty() {
            anyhow::bail!("OPENAI_API_KEY is empty");
        }
        if reqwest::Url::parse(&self.openai_base_url).is_err() {
            anyhow::bail!("OPENAI_BASE_URL is not a valid URL: {}", self.openai_base_url);
        }
        if self.edit_interval.is_zero() {
            anyhow::bail!("EDIT_INTERVAL_MS must be greater than zero");
        }
        if self.typing_interval.is_zero() {
            anyhow::bail!("TYPING_INTERVAL_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            edit_interval: self.edit_interval,
            typing_interval: self.typing_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "BOT_TOKEN",
        "TELEGRAM_API_URL",
        "TELOXIDE_API_URL",
        "LOG_FILE",
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "AI_MODEL",
        "AI_SYSTEM_PROMPT",
        "EDIT_INTERVAL_MS",
        "TYPING_INTERVAL_SECS",
        "ALLOWED_USERS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_load_config_with_defaults() {
        clear_env();
        env::set_var("BOT_TOKEN", "test_token");
        env::set_var("OPENAI_API_KEY", "test_key");

        let config = RelayConfig::load(None).unwrap();

        assert_eq!(config.telegram.bot_token, "test_token");
        assert!(config.telegram.api_url.is_none());
        assert_eq!(config.log_file, DEFAULT_LOG_FILE);
        assert_eq!(config.openai_api_key, "test_key");
        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.ai_model, DEFAULT_AI_MODEL);
        assert!(config.ai_system_prompt.is_none());
        assert_eq!(config.edit_interval, Duration::from_secs(1));
        assert_eq!(config.typing_interval, Duration::from_secs(10));
        assert!(config.allow_list.is_empty());
        assert!(config.validate().is_ok());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_config_overrides() {
        clear_env();
        env::set_var("BOT_TOKEN", "env_token");
        env::set_var("OPENAI_API_KEY", "test_key");
        env::set_var("AI_MODEL", "gpt-4o-mini");
        env::set_var("AI_SYSTEM_PROMPT", "be brief");
        env::set_var("EDIT_INTERVAL_MS", "1500");
        env::set_var("TYPING_INTERVAL_SECS", "5");
        env::set_var("ALLOWED_USERS", "1,2");

        let config = RelayConfig::load(Some("cli_token".to_string())).unwrap();

        assert_eq!(config.telegram.bot_token, "cli_token");
        assert_eq!(config.ai_model, "gpt-4o-mini");
        assert_eq!(config.ai_system_prompt.as_deref(), Some("be brief"));
        assert_eq!(
            config.feed_settings(),
            FeedSettings {
                edit_interval: Duration::from_millis(1500),
                typing_interval: Duration::from_secs(5),
            }
        );
        assert_eq!(config.allow_list.len(), 2);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_requires_openai_key() {
        clear_env();
        env::set_var("BOT_TOKEN", "test_token");
        assert!(RelayConfig::load(None).is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_rejects_bad_interval() {
        clear_env();
        env::set_var("BOT_TOKEN", "test_token");
        env::set_var("OPENAI_API_KEY", "test_key");
        env::set_var("EDIT_INTERVAL_MS", "soon");
        assert!(RelayConfig::load(None).is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_validate_rejects_zero_intervals_and_bad_url() {
        clear_env();
        env::set_var("BOT_TOKEN", "test_token");
        env::set_var("OPENAI_API_KEY", "test_key");
        let base = RelayConfig::load(None).unwrap();
        clear_env();

        let mut config = base.clone();
        config.edit_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.typing_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = base;
        config.openai_base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
