use async_trait::async_trait;
use leadbot_core::domain::lead::ChatId;
use thiserror::Error;

use crate::api::BotApiError;
use crate::types::{Contact, Update, User};

/// An update reduced to what the conversation reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelegramEvent {
    Text { chat_id: ChatId, from: Option<User>, text: String },
    ContactShared { chat_id: ChatId, from: Option<User>, contact: Contact },
    Callback { query_id: String, chat_id: ChatId, from: User, data: String },
    Unsupported { update_id: i64 },
}

impl TelegramEvent {
    pub fn from_update(update: Update) -> Self {
        if let Some(message) = update.message {
            let chat_id = ChatId(message.chat.id);
            if let Some(contact) = message.contact {
                return Self::ContactShared { chat_id, from: message.from, contact };
            }
            let text = message.text.unwrap_or_default();
            return Self::Text { chat_id, from: message.from, text };
        }

        if let Some(query) = update.callback_query {
            if let Some(message) = query.message {
                return Self::Callback {
                    query_id: query.id,
                    chat_id: ChatId(message.chat.id),
                    from: query.from,
                    data: query.data.unwrap_or_default(),
                };
            }
        }

        Self::Unsupported { update_id: update.update_id }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ContactShared { .. } => "contact",
            Self::Callback { .. } => "callback",
            Self::Unsupported { .. } => "unsupported",
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Text { chat_id, .. }
            | Self::ContactShared { chat_id, .. }
            | Self::Callback { chat_id, .. } => Some(*chat_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error("telegram send failed: {0}")]
    Send(#[from] BotApiError),
    #[error("storage failed: {0}")]
    Storage(String),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: TelegramEvent) -> Result<(), EventHandlerError>;
}
