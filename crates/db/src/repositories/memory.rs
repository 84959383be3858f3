use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use leadbot_core::domain::lead::ChatId;
use leadbot_core::domain::profile::{ChatProfile, ProfileUpdate};

use super::{ProfileRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: RwLock<BTreeMap<ChatId, ChatProfile>>,
}

#[async_trait::async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn upsert(&self, chat_id: ChatId, update: ProfileUpdate) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let current = profiles.remove(&chat_id);
        profiles.insert(chat_id, update.merge_into(chat_id, current, Utc::now()));
        Ok(())
    }

    async fn find_by_chat_id(
        &self,
        chat_id: ChatId,
    ) -> Result<Option<ChatProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&chat_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ChatProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.values().cloned().collect())
    }
}
