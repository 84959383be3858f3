//! Bitrix24 REST client used to push Telegram leads into the CRM.

pub mod client;
pub mod payload;

use std::sync::Arc;

use leadbot_core::config::CrmConfig;
use leadbot_core::sync::{CrmGateway, LazyGateway};

pub use client::{BitrixClient, CrmSettings};

/// Gateway that builds a [`BitrixClient`] from `config` on the first sync attempt.
pub fn lazy_gateway(config: CrmConfig) -> LazyGateway {
    LazyGateway::new(move || {
        BitrixClient::from_config(&config).map(|client| Arc::new(client) as Arc<dyn CrmGateway>)
    })
}
