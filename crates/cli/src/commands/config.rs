use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadbot_core::config::AppConfig;
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigReport {
    command: &'static str,
    status: &'static str,
    precedence: &'static str,
    settings: Vec<Setting>,
}

#[derive(Debug, Serialize)]
struct Setting {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key: &str, env_keys: &[&str]| {
        field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let settings = effective_values(&config)
        .into_iter()
        .map(|(key, env_keys, value)| Setting { key, value, source: source(key, env_keys) })
        .collect();

    let report = ConfigReport {
        command: "config",
        status: "ok",
        precedence: "env > file > default",
        settings,
    };

    match serde_json::to_string_pretty(&report) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure("config", "serialization", error.to_string(), 1),
    }
}

type Row = (&'static str, &'static [&'static str], String);

fn effective_values(config: &AppConfig) -> Vec<Row> {
    vec![
        row("database.url", &["LEADBOT_DATABASE_URL"], config.database.url.clone()),
        row(
            "database.max_connections",
            &["LEADBOT_DATABASE_MAX_CONNECTIONS"],
            config.database.max_connections.to_string(),
        ),
        row(
            "database.timeout_secs",
            &["LEADBOT_DATABASE_TIMEOUT_SECS"],
            config.database.timeout_secs.to_string(),
        ),
        row(
            "telegram.bot_token",
            &["LEADBOT_TELEGRAM_BOT_TOKEN", "TELEGRAM_TOKEN"],
            redact_bot_token(config.telegram.bot_token.expose_secret()),
        ),
        row(
            "telegram.api_base_url",
            &["LEADBOT_TELEGRAM_API_BASE_URL"],
            config.telegram.api_base_url.clone(),
        ),
        row(
            "telegram.poll_timeout_secs",
            &["LEADBOT_TELEGRAM_POLL_TIMEOUT_SECS"],
            config.telegram.poll_timeout_secs.to_string(),
        ),
        row(
            "crm.base_url",
            &["LEADBOT_CRM_BASE_URL", "B24_BASE"],
            config
                .crm
                .base_url()
                .map(|url| redact_webhook(&url))
                .unwrap_or_else(|| "<unset>".to_string()),
        ),
        row(
            "crm.request_timeout_secs",
            &["LEADBOT_CRM_REQUEST_TIMEOUT_SECS"],
            config.crm.request_timeout_secs.to_string(),
        ),
        row(
            "crm.sync_timeout_secs",
            &["LEADBOT_CRM_SYNC_TIMEOUT_SECS"],
            config.crm.sync_timeout_secs.to_string(),
        ),
        row(
            "crm.entity_type_id",
            &["LEADBOT_CRM_ENTITY_TYPE_ID"],
            config.crm.entity_type_id.to_string(),
        ),
        row("crm.source_id", &[], config.crm.source_id.clone()),
        row(
            "crm.assigned_by_id",
            &["LEADBOT_CRM_ASSIGNED_BY_ID"],
            config.crm.assigned_by_id.to_string(),
        ),
        row(
            "server.bind_address",
            &["LEADBOT_SERVER_BIND_ADDRESS"],
            config.server.bind_address.clone(),
        ),
        row(
            "server.health_check_port",
            &["LEADBOT_SERVER_HEALTH_CHECK_PORT"],
            config.server.health_check_port.to_string(),
        ),
        row(
            "logging.level",
            &["LEADBOT_LOGGING_LEVEL", "LEADBOT_LOG_LEVEL"],
            config.logging.level.clone(),
        ),
        row(
            "logging.format",
            &["LEADBOT_LOGGING_FORMAT", "LEADBOT_LOG_FORMAT"],
            config.logging.format.as_str().to_string(),
        ),
        row("catalog.speakers", &[], config.catalog.speakers().len().to_string()),
    ]
}

fn row(key: &'static str, env_keys: &'static [&'static str], value: String) -> Row {
    (key, env_keys, value)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("leadbot.toml"), PathBuf::from("config/leadbot.toml")]
        .into_iter()
        .find(|path| path.exists())
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
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

/// Keeps the numeric bot id, hides the secret half.
fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}

/// Webhook URLs carry their secret in the path, so only scheme and host are shown.
fn redact_webhook(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "<redacted>".to_string();
    };
    let host = rest.split('/').next().unwrap_or_default();
    format!("{scheme}://{host}/***")
}
