use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reply::DEFAULT_CURRENCY;
use crate::retry::{
    RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT_MS, DEFAULT_DEADLINE_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RETRY_DELAYS_MS,
};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub webhook: WebhookConfig,
    pub reply: ReplyConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub base_url: String,
    pub secret: SecretString,
    pub company_id: String,
    pub attempt_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_delays_ms: Vec<u64>,
    pub deadline_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ReplyConfig {
    pub currency: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub webhook_base_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_company_id: Option<String>,
    pub webhook_max_attempts: Option<u32>,
    pub webhook_retry_delays_ms: Option<Vec<u64>>,
    pub webhook_attempt_timeout_ms: Option<u64>,
    pub webhook_deadline_ms: Option<u64>,
    pub reply_currency: Option<String>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            webhook: WebhookConfig {
                base_url: String::new(),
                secret: String::new().into(),
                company_id: String::new(),
                attempt_timeout_ms: DEFAULT_ATTEMPT_TIMEOUT_MS,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                retry_delays_ms: DEFAULT_RETRY_DELAYS_MS.to_vec(),
                deadline_ms: DEFAULT_DEADLINE_MS,
            },
            reply: ReplyConfig { currency: DEFAULT_CURRENCY.to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl WebhookConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            delays: self.retry_delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            deadline: Duration::from_millis(self.deadline_ms),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("chatorder.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(webhook) = patch.webhook {
            if let Some(base_url) = webhook.base_url {
                self.webhook.base_url = base_url;
            }
            if let Some(webhook_secret_value) = webhook.secret {
                self.webhook.secret = secret_value(webhook_secret_value);
            }
            if let Some(company_id) = webhook.company_id {
                self.webhook.company_id = company_id;
            }
            if let Some(attempt_timeout_ms) = webhook.attempt_timeout_ms {
                self.webhook.attempt_timeout_ms = attempt_timeout_ms;
            }
            if let Some(max_attempts) = webhook.max_attempts {
                self.webhook.max_attempts = max_attempts;
            }
            if let Some(retry_delays_ms) = webhook.retry_delays_ms {
                self.webhook.retry_delays_ms = retry_delays_ms;
            }
            if let Some(deadline_ms) = webhook.deadline_ms {
                self.webhook.deadline_ms = deadline_ms;
            }
        }

        if let Some(reply) = patch.reply {
            if let Some(currency) = reply.currency {
                self.reply.currency = currency;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("CHATORDER_WEBHOOK_BASE_URL") {
            self.webhook.base_url = value;
        }
        if let Some(value) = read_env("CHATORDER_WEBHOOK_SECRET") {
            self.webhook.secret = secret_value(value);
        }
        if let Some(value) = read_env("CHATORDER_WEBHOOK_COMPANY_ID") {
            self.webhook.company_id = value;
        }
        if let Some(value) = read_env("CHATORDER_WEBHOOK_ATTEMPT_TIMEOUT_MS") {
            self.webhook.attempt_timeout_ms =
                parse_u64("CHATORDER_WEBHOOK_ATTEMPT_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = read_env("CHATORDER_WEBHOOK_MAX_ATTEMPTS") {
            self.webhook.max_attempts = parse_u32("CHATORDER_WEBHOOK_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("CHATORDER_WEBHOOK_RETRY_DELAYS_MS") {
            self.webhook.retry_delays_ms =
                parse_u64_list("CHATORDER_WEBHOOK_RETRY_DELAYS_MS", &value)?;
        }
        if let Some(value) = read_env("CHATORDER_WEBHOOK_DEADLINE_MS") {
            self.webhook.deadline_ms = parse_u64("CHATORDER_WEBHOOK_DEADLINE_MS", &value)?;
        }

        if let Some(value) = read_env("CHATORDER_REPLY_CURRENCY") {
            self.reply.currency = value;
        }

        let log_level =
            read_env("CHATORDER_LOGGING_LEVEL").or_else(|| read_env("CHATORDER_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CHATORDER_LOGGING_FORMAT").or_else(|| read_env("CHATORDER_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(base_url) = overrides.webhook_base_url {
            self.webhook.base_url = base_url;
        }
        if let Some(webhook_secret) = overrides.webhook_secret {
            self.webhook.secret = secret_value(webhook_secret);
        }
        if let Some(company_id) = overrides.webhook_company_id {
            self.webhook.company_id = company_id;
        }
        if let Some(max_attempts) = overrides.webhook_max_attempts {
            self.webhook.max_attempts = max_attempts;
        }
        if let Some(retry_delays_ms) = overrides.webhook_retry_delays_ms {
            self.webhook.retry_delays_ms = retry_delays_ms;
        }
        if let Some(attempt_timeout_ms) = overrides.webhook_attempt_timeout_ms {
            self.webhook.attempt_timeout_ms = attempt_timeout_ms;
        }
        if let Some(deadline_ms) = overrides.webhook_deadline_ms {
            self.webhook.deadline_ms = deadline_ms;
        }
        if let Some(currency) = overrides.reply_currency {
            self.reply.currency = currency;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_webhook(&self.webhook)?;
        validate_reply(&self.reply)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("chatorder.toml"), PathBuf::from("config/chatorder.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_webhook(webhook: &WebhookConfig) -> Result<(), ConfigError> {
    let base_url = webhook.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::Validation(
            "webhook.base_url is required (the order backend origin, e.g. https://shop.example.com)"
                .to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "webhook.base_url must start with http:// or https://".to_string(),
        ));
    }

    if webhook.secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "webhook.secret is required; it is sent as the `x-webhook-secret` header".to_string(),
        ));
    }

    if webhook.company_id.trim().is_empty() {
        return Err(ConfigError::Validation("webhook.company_id is required".to_string()));
    }

    if webhook.attempt_timeout_ms == 0 || webhook.attempt_timeout_ms > 120_000 {
        return Err(ConfigError::Validation(
            "webhook.attempt_timeout_ms must be in range 1..=120000".to_string(),
        ));
    }

    if webhook.max_attempts == 0 || webhook.max_attempts > 10 {
        return Err(ConfigError::Validation(
            "webhook.max_attempts must be in range 1..=10".to_string(),
        ));
    }

    if webhook.retry_delays_ms.is_empty() {
        return Err(ConfigError::Validation(
            "webhook.retry_delays_ms must list at least one delay".to_string(),
        ));
    }

    if webhook.deadline_ms < webhook.attempt_timeout_ms {
        return Err(ConfigError::Validation(
            "webhook.deadline_ms must be at least webhook.attempt_timeout_ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_reply(reply: &ReplyConfig) -> Result<(), ConfigError> {
    if reply.currency.trim().is_empty() {
        return Err(ConfigError::Validation("reply.currency must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64_list(key: &str, value: &str) -> Result<Vec<u64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_u64(key, item))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    webhook: Option<WebhookPatch>,
    reply: Option<ReplyPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPatch {
    base_url: Option<String>,
    secret: Option<String>,
    company_id: Option<String>,
    attempt_timeout_ms: Option<u64>,
    max_attempts: Option<u32>,
    retry_delays_ms: Option<Vec<u64>>,
    deadline_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReplyPatch {
    currency: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
