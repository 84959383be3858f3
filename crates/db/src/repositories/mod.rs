use async_trait::async_trait;
use thiserror::Error;

use leadbot_core::domain::lead::ChatId;
use leadbot_core::domain::profile::{ChatProfile, ProfileUpdate};

pub mod memory;
pub mod profile;

pub use memory::InMemoryProfileRepository;
pub use profile::SqlProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Inserts or merges answers for `chat_id`; blank fields never erase stored values.
    async fn upsert(&self, chat_id: ChatId, update: ProfileUpdate) -> Result<(), RepositoryError>;
    async fn find_by_chat_id(&self, chat_id: ChatId)
        -> Result<Option<ChatProfile>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<ChatProfile>, RepositoryError>;
}
