mod bootstrap;
mod conversation;
mod health;

use anyhow::Result;
use leadbot_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use leadbot_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState {
            db_pool: app.db_pool.clone(),
            crm_configured: app.config.crm.base_url().is_some(),
        },
    )
    .await?;

    tracing::info!(
        event_name = "system.server.started",
        speakers = app.config.catalog.speakers().len(),
        "leadbot-server polling for updates"
    );

    tokio::select! {
        next_offset = app.runner.run() => {
            tracing::warn!(
                event_name = "system.server.polling_stopped",
                next_offset,
                "update polling stopped"
            );
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(event_name = "system.server.stopping", "shutdown signal received");
        }
    }

    app.db_pool.close().await;
    Ok(())
}
