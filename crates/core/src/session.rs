use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::domain::lead::{ChatId, LeadSession, SessionPatch};

/// Per-chat lead data guarded by a single lock.
///
/// Readers only ever receive copies, so the lock is never held across I/O.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<ChatId, LeadSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self, chat_id: ChatId) -> Option<LeadSession> {
        let sessions = self.sessions.lock().await;
        sessions.get(&chat_id).cloned()
    }

    /// Applies `mutate` to the chat's session, creating an empty one first if needed.
    pub async fn update<F>(&self, chat_id: ChatId, mutate: F)
    where
        F: FnOnce(&mut LeadSession),
    {
        let mut sessions = self.sessions.lock().await;
        mutate(sessions.entry(chat_id).or_default());
    }

    pub async fn apply(&self, chat_id: ChatId, patch: SessionPatch) {
        self.update(chat_id, |session| session.apply(patch)).await;
    }

    pub async fn record_contact(&self, chat_id: ChatId, phone: &str, contact_name: &str) {
        self.apply(chat_id, SessionPatch::contact(phone, contact_name)).await;
    }

    pub async fn record_course(&self, chat_id: ChatId, speaker_name: &str, city: &str) {
        self.apply(chat_id, SessionPatch::course(speaker_name, city)).await;
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
