use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::catalog::{Catalog, Speaker};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub crm: CrmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub catalog: Catalog,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    /// Inbound webhook URL of the CRM. It embeds the access token, hence the secret wrapper.
    pub base_url: Option<SecretString>,
    pub request_timeout_secs: u64,
    pub sync_timeout_secs: u64,
    pub entity_type_id: u32,
    pub source_id: String,
    pub source_description: String,
    pub assigned_by_id: u32,
}

impl CrmConfig {
    /// Configured base URL without trailing slashes, or `None` when unset or blank.
    pub fn base_url(&self) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|value| value.expose_secret().trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
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

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base_url: Option<String>,
    pub crm_base_url: Option<String>,
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
            database: DatabaseConfig {
                url: "sqlite://leadbot.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 60,
            },
            crm: CrmConfig {
                base_url: None,
                request_timeout_secs: 10,
                sync_timeout_secs: 15,
                entity_type_id: 1050,
                source_id: "TELEGRAM".to_string(),
                source_description: "Telegram".to_string(),
                assigned_by_id: 35,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            catalog: Catalog::default(),
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadbot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = Some(secret_value(base_url));
            }
            if let Some(request_timeout_secs) = crm.request_timeout_secs {
                self.crm.request_timeout_secs = request_timeout_secs;
            }
            if let Some(sync_timeout_secs) = crm.sync_timeout_secs {
                self.crm.sync_timeout_secs = sync_timeout_secs;
            }
            if let Some(entity_type_id) = crm.entity_type_id {
                self.crm.entity_type_id = entity_type_id;
            }
            if let Some(source_id) = crm.source_id {
                self.crm.source_id = source_id;
            }
            if let Some(source_description) = crm.source_description {
                self.crm.source_description = source_description;
            }
            if let Some(assigned_by_id) = crm.assigned_by_id {
                self.crm.assigned_by_id = assigned_by_id;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
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

        if let Some(catalog) = patch.catalog {
            if let Some(speakers) = catalog.speakers {
                self.catalog = Catalog::new(speakers);
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADBOT_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADBOT_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("LEADBOT_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LEADBOT_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let bot_token =
            read_env("LEADBOT_TELEGRAM_BOT_TOKEN").or_else(|| read_env("TELEGRAM_TOKEN"));
        if let Some(value) = bot_token {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("LEADBOT_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("LEADBOT_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("LEADBOT_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        let crm_base_url = read_env("LEADBOT_CRM_BASE_URL").or_else(|| read_env("B24_BASE"));
        if let Some(value) = crm_base_url {
            self.crm.base_url = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADBOT_CRM_REQUEST_TIMEOUT_SECS") {
            self.crm.request_timeout_secs = parse_u64("LEADBOT_CRM_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_CRM_SYNC_TIMEOUT_SECS") {
            self.crm.sync_timeout_secs = parse_u64("LEADBOT_CRM_SYNC_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_CRM_ENTITY_TYPE_ID") {
            self.crm.entity_type_id = parse_u32("LEADBOT_CRM_ENTITY_TYPE_ID", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_CRM_ASSIGNED_BY_ID") {
            self.crm.assigned_by_id = parse_u32("LEADBOT_CRM_ASSIGNED_BY_ID", &value)?;
        }

        if let Some(value) = read_env("LEADBOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADBOT_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("LEADBOT_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADBOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LEADBOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("LEADBOT_LOGGING_LEVEL").or_else(|| read_env("LEADBOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADBOT_LOGGING_FORMAT").or_else(|| read_env("LEADBOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.telegram_api_base_url {
            self.telegram.api_base_url = api_base_url;
        }
        if let Some(base_url) = overrides.crm_base_url {
            self.crm.base_url = Some(secret_value(base_url));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_crm(&self.crm)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadbot.toml"), PathBuf::from("config/leadbot.toml")]
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

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather with /newbot or /token"
                .to_string(),
        ));
    }

    let well_formed = match bot_token.split_once(':') {
        Some((bot_id, secret)) => {
            !bot_id.is_empty() && bot_id.chars().all(|ch| ch.is_ascii_digit()) && !secret.is_empty()
        }
        None => false,
    };
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    if !is_http_url(telegram.api_base_url.trim()) {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if telegram.poll_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 0..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    // An absent base URL is reported lazily by the CRM client on first use.
    if let Some(base_url) = crm.base_url() {
        if !is_http_url(&base_url) {
            return Err(ConfigError::Validation(
                "crm.base_url must start with http:// or https://".to_string(),
            ));
        }
    }

    if crm.request_timeout_secs == 0 || crm.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if crm.sync_timeout_secs == 0 || crm.sync_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.sync_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if crm.source_id.trim().is_empty() {
        return Err(ConfigError::Validation("crm.source_id must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    crm: Option<CrmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    catalog: Option<CatalogPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    sync_timeout_secs: Option<u64>,
    entity_type_id: Option<u32>,
    source_id: Option<String>,
    source_description: Option<String>,
    assigned_by_id: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    speakers: Option<Vec<Speaker>>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    const VALID_TOKEN: &str = "123456:test-token";

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LEADBOT_BOT_TOKEN", "42:from-env");
        env::set_var("TEST_LEADBOT_CRM_URL", "https://crm.example.com/rest/1/abc/");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadbot.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_LEADBOT_BOT_TOKEN}"

[crm]
base_url = "${TEST_LEADBOT_CRM_URL}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "42:from-env",
                "bot token should be loaded from environment",
            )?;
            ensure(
                config.crm.base_url().as_deref() == Some("https://crm.example.com/rest/1/abc"),
                "crm base url should be interpolated and trimmed",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_LEADBOT_BOT_TOKEN", "TEST_LEADBOT_CRM_URL"]);
        result
    }

    #[test]
    fn legacy_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TELEGRAM_TOKEN", VALID_TOKEN);
        env::set_var("B24_BASE", "https://crm.example.com/rest/35/hook");
        env::set_var("LEADBOT_LOG_LEVEL", "warn");
        env::set_var("LEADBOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == VALID_TOKEN,
                "TELEGRAM_TOKEN alias should set the bot token",
            )?;
            ensure(
                config.crm.base_url().as_deref() == Some("https://crm.example.com/rest/35/hook"),
                "B24_BASE alias should set the crm base url",
            )?;
            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["TELEGRAM_TOKEN", "B24_BASE", "LEADBOT_LOG_LEVEL", "LEADBOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOT_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("LEADBOT_TELEGRAM_BOT_TOKEN", "1:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadbot.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[telegram]
bot_token = "2:from-file"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.telegram.bot_token.expose_secret() == "1:from-env",
                "env bot token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["LEADBOT_DATABASE_URL", "LEADBOT_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOT_TELEGRAM_BOT_TOKEN", "not-a-token");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(&["LEADBOT_TELEGRAM_BOT_TOKEN"]);
        result
    }

    #[test]
    fn missing_crm_base_url_is_not_a_load_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                telegram_bot_token: Some(VALID_TOKEN.to_string()),
                crm_base_url: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.crm.base_url().is_none(), "blank crm base url should read as unset")?;
        ensure(config.crm.request_timeout_secs == 10, "default per-call timeout is 10s")?;
        ensure(config.crm.sync_timeout_secs == 15, "default sync timeout is 15s")
    }

    #[test]
    fn crm_base_url_must_be_http() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                telegram_bot_token: Some(VALID_TOKEN.to_string()),
                crm_base_url: Some("crm.example.com/rest".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        ensure(
            matches!(result, Err(ConfigError::Validation(ref message)) if message.contains("crm.base_url")),
            "non-http crm base url should be rejected",
        )
    }

    #[test]
    fn catalog_is_loaded_from_file_sorted_by_speaker() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("leadbot.toml");
        fs::write(
            &path,
            r#"
[telegram]
bot_token = "7:file-token"

[[catalog.speakers]]
name = "Zoya"

[[catalog.speakers.courses]]
city = "Kazan"
date = "2026-11-02"

[[catalog.speakers]]
name = "Alex"

[[catalog.speakers.courses]]
city = "Moscow"
program = "Three days of practice"
"#,
        )
        .map_err(|err| err.to_string())?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;

        let (speaker, course) =
            config.catalog.course(0, 0).ok_or_else(|| "first course missing".to_string())?;
        ensure(speaker.name == "Alex", "speakers should be sorted by name")?;
        ensure(course.city == "Moscow", "course city should be loaded")?;
        ensure(config.catalog.speakers().len() == 2, "both speakers should be loaded")
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADBOT_TELEGRAM_BOT_TOKEN", "99:secret-bot-value");
        env::set_var("LEADBOT_CRM_BASE_URL", "https://crm.example.com/rest/1/secret-hook-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("secret-bot-value"), "debug output should not contain bot token")?;
            ensure(
                !debug.contains("secret-hook-value"),
                "debug output should not contain crm webhook url",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["LEADBOT_TELEGRAM_BOT_TOKEN", "LEADBOT_CRM_BASE_URL"]);
        result
    }
}
