use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{EventHandler, TelegramEvent};
use crate::types::Update;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("update fetch failed: {0}")]
    Receive(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of update batches. `Ok(None)` means the source is closed for good.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn next_batch(&self, offset: i64) -> Result<Option<Vec<Update>>, TransportError>;
}

/// Long-polling loop. Each update is handled on its own task, so one slow
/// chat never blocks the others.
pub struct PollingRunner {
    source: Arc<dyn UpdateSource>,
    handler: Arc<dyn EventHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        handler: Arc<dyn EventHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, handler, reconnect_policy }
    }

    /// Runs until the source closes or consecutive failures exhaust the retry
    /// budget, then waits for in-flight handlers. Returns the next offset.
    pub async fn run(&self) -> i64 {
        let mut offset = 0_i64;
        let mut failures = 0_u32;
        let mut tasks = JoinSet::new();

        loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join_result(joined);
            }

            match self.source.next_batch(offset).await {
                Ok(None) => {
                    info!(event_name = "telegram.polling.closed", offset, "update source closed");
                    break;
                }
                Ok(Some(updates)) => {
                    failures = 0;
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.spawn_handler(&mut tasks, update);
                    }
                }
                Err(transport_error) => {
                    warn!(
                        event_name = "telegram.polling.failed",
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "polling for updates failed"
                    );

                    if failures >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "polling retries exhausted; stopping without crash"
                        );
                        break;
                    }

                    let delay = self.reconnect_policy.backoff(failures);
                    failures += 1;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join_result(joined);
        }
        offset
    }

    fn spawn_handler(&self, tasks: &mut JoinSet<()>, update: Update) {
        let update_id = update.update_id;
        let event = TelegramEvent::from_update(update);
        if matches!(event, TelegramEvent::Unsupported { .. }) {
            debug!(
                event_name = "telegram.update.skipped",
                update_id,
                "ignoring unsupported update"
            );
            return;
        }

        info!(
            event_name = "telegram.update.received",
            update_id,
            kind = event.kind(),
            chat_id = event.chat_id().map(|id| id.0).unwrap_or_default(),
            "received telegram update"
        );

        let handler = self.handler.clone();
        tasks.spawn(async move {
            if let Err(error) = handler.handle(event).await {
                warn!(
                    event_name = "telegram.update.handler_failed",
                    update_id,
                    error = %error,
                    "update handler failed; continuing polling loop"
                );
            }
        });
    }
}

fn log_join_result(joined: Result<(), tokio::task::JoinError>) {
    if let Err(join_error) = joined {
        warn!(
            event_name = "telegram.update.task_aborted",
            error = %join_error,
            "update handler task did not complete"
        );
    }
}
