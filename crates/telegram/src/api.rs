use std::time::Duration;

use async_trait::async_trait;
use leadbot_core::config::TelegramConfig;
use leadbot_core::domain::lead::ChatId;
use leadbot_core::sync::ChatNotifier;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::polling::{TransportError, UpdateSource};
use crate::types::{AnswerCallbackQuery, ApiResponse, GetUpdates, Message, SendMessage, Update};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BotApiError {
    #[error("telegram transport failure: {0}")]
    Transport(String),
    #[error("telegram api error {code:?}: {description}")]
    Api { code: Option<i64>, description: String },
    #[error("telegram http {status}")]
    Http { status: u16 },
    #[error("telegram response could not be decoded: {0}")]
    Decode(String),
}

/// Bot API client. The bot token is part of every request URL and never logged.
#[derive(Clone, Debug)]
pub struct BotApi {
    http: Client,
    endpoint: SecretString,
    poll_timeout_secs: u64,
}

impl BotApi {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, BotApiError> {
        Self::new(&config.api_base_url, &config.bot_token, config.poll_timeout_secs)
    }

    pub fn new(
        api_base_url: &str,
        bot_token: &SecretString,
        poll_timeout_secs: u64,
    ) -> Result<Self, BotApiError> {
        let http = Client::builder()
            .build()
            .map_err(|error| BotApiError::Transport(error.without_url().to_string()))?;
        let endpoint = format!(
            "{}/bot{}",
            api_base_url.trim().trim_end_matches('/'),
            bot_token.expose_secret().trim()
        );

        Ok(Self { http, endpoint: endpoint.into(), poll_timeout_secs })
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, BotApiError> {
        let params = GetUpdates {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: vec!["message".to_string(), "callback_query".to_string()],
        };
        let timeout = Duration::from_secs(self.poll_timeout_secs) + LONG_POLL_GRACE;
        self.call("getUpdates", &params, timeout).await
    }

    pub async fn send_message(&self, message: &SendMessage) -> Result<Message, BotApiError> {
        self.call("sendMessage", message, REQUEST_TIMEOUT).await
    }

    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), BotApiError> {
        let params =
            AnswerCallbackQuery { callback_query_id: callback_query_id.to_string(), text: None };
        let _: bool = self.call("answerCallbackQuery", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn call<P, R>(
        &self,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<R, BotApiError>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.endpoint.expose_secret());
        let response = self
            .http
            .post(url)
            .timeout(timeout)
            .json(params)
            .send()
            .await
            .map_err(|error| BotApiError::Transport(error.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|error| BotApiError::Transport(error.without_url().to_string()))?;

        let envelope: ApiResponse<R> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(BotApiError::Http { status: status.as_u16() })
            }
            Err(error) => return Err(BotApiError::Decode(error.to_string())),
        };

        if !envelope.ok {
            return Err(BotApiError::Api {
                code: envelope.error_code,
                description: envelope.description.unwrap_or_default(),
            });
        }

        debug!(event_name = "telegram.api.call_ok", method, "telegram call succeeded");
        envelope.result.ok_or_else(|| BotApiError::Decode(format!("{method} returned no result")))
    }
}

/// Outgoing side of the Bot API used by conversation handlers.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, message: SendMessage) -> Result<(), BotApiError>;
    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), BotApiError>;
}

#[async_trait]
impl Messenger for BotApi {
    async fn send(&self, message: SendMessage) -> Result<(), BotApiError> {
        self.send_message(&message).await.map(|_| ())
    }

    async fn answer_callback(&self, callback_query_id: &str) -> Result<(), BotApiError> {
        self.answer_callback_query(callback_query_id).await
    }
}

#[async_trait]
impl ChatNotifier for BotApi {
    async fn notify(&self, chat_id: ChatId, text: &str) {
        if let Err(error) = self.send_message(&SendMessage::new(chat_id.0, text)).await {
            warn!(
                event_name = "telegram.notify.failed",
                chat_id = %chat_id,
                error = %error,
                "failed to deliver notification"
            );
        }
    }
}

#[async_trait]
impl UpdateSource for BotApi {
    async fn next_batch(&self, offset: i64) -> Result<Option<Vec<Update>>, TransportError> {
        self.get_updates(offset)
            .await
            .map(Some)
            .map_err(|error| TransportError::Receive(error.to_string()))
    }
}
