use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chatorder_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

struct Field<'a> {
    key_path: &'static str,
    env_keys: &'static [&'static str],
    value: &'a str,
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let secret = redact_secret(config.webhook.secret.expose_secret());
    let attempt_timeout_ms = config.webhook.attempt_timeout_ms.to_string();
    let max_attempts = config.webhook.max_attempts.to_string();
    let retry_delays_ms = config
        .webhook
        .retry_delays_ms
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let deadline_ms = config.webhook.deadline_ms.to_string();
    let log_format = format!("{:?}", config.logging.format);

    let fields = [
        Field {
            key_path: "webhook.base_url",
            env_keys: &["CHATORDER_WEBHOOK_BASE_URL"],
            value: &config.webhook.base_url,
        },
        Field {
            key_path: "webhook.secret",
            env_keys: &["CHATORDER_WEBHOOK_SECRET"],
            value: &secret,
        },
        Field {
            key_path: "webhook.company_id",
            env_keys: &["CHATORDER_WEBHOOK_COMPANY_ID"],
            value: &config.webhook.company_id,
        },
        Field {
            key_path: "webhook.attempt_timeout_ms",
            env_keys: &["CHATORDER_WEBHOOK_ATTEMPT_TIMEOUT_MS"],
            value: &attempt_timeout_ms,
        },
        Field {
            key_path: "webhook.max_attempts",
            env_keys: &["CHATORDER_WEBHOOK_MAX_ATTEMPTS"],
            value: &max_attempts,
        },
        Field {
            key_path: "webhook.retry_delays_ms",
            env_keys: &["CHATORDER_WEBHOOK_RETRY_DELAYS_MS"],
            value: &retry_delays_ms,
        },
        Field {
            key_path: "webhook.deadline_ms",
            env_keys: &["CHATORDER_WEBHOOK_DEADLINE_MS"],
            value: &deadline_ms,
        },
        Field {
            key_path: "reply.currency",
            env_keys: &["CHATORDER_REPLY_CURRENCY"],
            value: &config.reply.currency,
        },
        Field {
            key_path: "logging.level",
            env_keys: &["CHATORDER_LOGGING_LEVEL", "CHATORDER_LOG_LEVEL"],
            value: &config.logging.level,
        },
        Field {
            key_path: "logging.format",
            env_keys: &["CHATORDER_LOGGING_FORMAT", "CHATORDER_LOG_FORMAT"],
            value: &log_format,
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in &fields {
        let source = field_source(
            field.key_path,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key_path, field.value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("chatorder.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/chatorder.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env_is_set(key)) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

/// Blank values are ignored by config loading, so they are not a source either.
fn env_is_set(key: &str) -> bool {
    env::var(key).is_ok_and(|value| !value.trim().is_empty())
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    format!("<redacted, {} chars>", trimmed.chars().count())
}
