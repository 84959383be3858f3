use std::sync::Arc;
use std::time::Duration;

use leadbot_core::config::{AppConfig, ConfigError, LoadOptions};
use leadbot_core::session::SessionStore;
use leadbot_core::sync::{SyncCoordinator, SyncFlags};
use leadbot_db::{connect_with_settings, migrations, DbPool, SqlProfileRepository};
use leadbot_telegram::{BotApi, BotApiError, PollingRunner, ReconnectPolicy};
use thiserror::Error;
use tracing::{info, warn};

use crate::conversation::Conversation;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub coordinator: Arc<SyncCoordinator>,
    pub conversation: Arc<Conversation>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("telegram client setup failed: {0}")]
    Telegram(#[from] BotApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires storage, the CRM gateway and the Telegram transport around an already loaded config.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    config.validate()?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    if config.catalog.is_empty() {
        warn!(
            event_name = "system.bootstrap.catalog_empty",
            "no speakers configured; the greeting will show an empty keyboard"
        );
    }
    if config.crm.base_url().is_none() {
        warn!(
            event_name = "system.bootstrap.crm_unconfigured",
            "crm base url is not set; leads will be stored but not synced"
        );
    }

    let bot = Arc::new(BotApi::from_config(&config.telegram)?);
    let coordinator = Arc::new(
        SyncCoordinator::new(
            Arc::new(SessionStore::new()),
            Arc::new(SyncFlags::new()),
            leadbot_crm::lazy_gateway(config.crm.clone()),
            bot.clone(),
        )
        .with_sync_timeout(Duration::from_secs(config.crm.sync_timeout_secs)),
    );
    let conversation = Arc::new(Conversation::new(
        config.catalog.clone(),
        bot.clone(),
        Arc::new(SqlProfileRepository::new(db_pool.clone())),
        coordinator.clone(),
    ));
    let runner = PollingRunner::new(bot.clone(), conversation.clone(), ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.ready",
        speakers = config.catalog.speakers().len(),
        "application wired"
    );

    Ok(Application { config, db_pool, coordinator, conversation, runner })
}
