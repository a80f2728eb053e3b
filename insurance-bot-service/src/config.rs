use insurance_flow::{MachineConfig, OutOfStatePolicy};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Polling,
    Webhook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Mock,
    Vision,
}

/// Service configuration, read from the environment.
#[derive(Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub telegram_api_url: String,
    pub transport: TransportMode,
    pub webhook_secret: Option<String>,
    pub port: u16,
    pub extractor: ExtractorKind,
    pub openrouter_api_key: Option<String>,
    pub extraction_model: String,
    pub assistant_model: String,
    pub database_url: Option<String>,
    pub session_idle_ttl: Duration,
    pub session_max: usize,
    pub reaper_interval: Duration,
    pub machine: MachineConfig,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_api_url", &self.telegram_api_url)
            .field("transport", &self.transport)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .field("extractor", &self.extractor)
            .field("openrouter_api_key", &self.openrouter_api_key.as_ref().map(|_| "<redacted>"))
            .field("extraction_model", &self.extraction_model)
            .field("assistant_model", &self.assistant_model)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("session_idle_ttl", &self.session_idle_ttl)
            .field("session_max", &self.session_max)
            .field("reaper_interval", &self.reaper_interval)
            .field("machine", &self.machine)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let telegram_token =
            get("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let transport = match get("TRANSPORT_MODE").as_deref() {
            None | Some("polling") => TransportMode::Polling,
            Some("webhook") => TransportMode::Webhook,
            Some(other) => return Err(invalid("TRANSPORT_MODE", other, "expected polling or webhook")),
        };

        let extractor = match get("EXTRACTOR").as_deref() {
            None | Some("mock") => ExtractorKind::Mock,
            Some("vision") => ExtractorKind::Vision,
            Some(other) => return Err(invalid("EXTRACTOR", other, "expected mock or vision")),
        };

        let out_of_state = match get("OUT_OF_STATE_FEEDBACK").as_deref() {
            None | Some("silent") => OutOfStatePolicy::Silent,
            Some("notify") => OutOfStatePolicy::Notify,
            Some(other) => {
                return Err(invalid("OUT_OF_STATE_FEEDBACK", other, "expected silent or notify"));
            }
        };

        let assistant_replies = parse_or("ASSISTANT_REPLIES", get("ASSISTANT_REPLIES"), false)?;
        let openrouter_api_key = get("OPENROUTER_API_KEY");

        if extractor == ExtractorKind::Vision && openrouter_api_key.is_none() {
            return Err(ConfigError::Missing("OPENROUTER_API_KEY"));
        }
        if assistant_replies && openrouter_api_key.is_none() {
            return Err(ConfigError::Missing("OPENROUTER_API_KEY"));
        }

        Ok(Self {
            telegram_token,
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string())
                .trim_end_matches('/')
                .to_string(),
            transport,
            webhook_secret: get("WEBHOOK_SECRET"),
            port: parse_or("PORT", get("PORT"), 3000)?,
            extractor,
            openrouter_api_key,
            extraction_model: get("EXTRACTION_MODEL")
                .unwrap_or_else(|| "openai/gpt-4.1-mini".to_string()),
            assistant_model: get("ASSISTANT_MODEL")
                .unwrap_or_else(|| "openai/gpt-4o-mini".to_string()),
            database_url: get("DATABASE_URL"),
            session_idle_ttl: Duration::from_secs(parse_or(
                "SESSION_IDLE_TTL_SECS",
                get("SESSION_IDLE_TTL_SECS"),
                86_400,
            )?),
            session_max: parse_or("SESSION_MAX", get("SESSION_MAX"), 10_000)?,
            reaper_interval: Duration::from_secs(
                parse_or("REAPER_INTERVAL_SECS", get("REAPER_INTERVAL_SECS"), 300)?.max(1),
            ),
            machine: MachineConfig {
                out_of_state,
                assistant_replies,
                price_usd: parse_or("POLICY_PRICE", get("POLICY_PRICE"), 100)?,
            },
        })
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
    }
}
