use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::ChatId;

/// Persisted answers of one chat, kept for operator export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatProfile {
    pub chat_id: ChatId,
    pub phone: String,
    pub full_name: String,
    pub city: String,
    pub speaker: String,
    pub updated_at: DateTime<Utc>,
}

/// Incoming answers for a chat. Blank fields leave the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub phone: String,
    pub full_name: String,
    pub city: String,
    pub speaker: String,
}

impl ProfileUpdate {
    pub fn contact(phone: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self { phone: phone.into(), full_name: full_name.into(), ..Self::default() }
    }

    pub fn speaker(speaker: impl Into<String>) -> Self {
        Self { speaker: speaker.into(), ..Self::default() }
    }

    pub fn course(speaker: impl Into<String>, city: impl Into<String>) -> Self {
        Self { speaker: speaker.into(), city: city.into(), ..Self::default() }
    }

    /// Merges `self` into `current`, or starts a new profile for `chat_id`.
    pub fn merge_into(
        self,
        chat_id: ChatId,
        current: Option<ChatProfile>,
        now: DateTime<Utc>,
    ) -> ChatProfile {
        let mut profile = current.unwrap_or(ChatProfile {
            chat_id,
            phone: String::new(),
            full_name: String::new(),
            city: String::new(),
            speaker: String::new(),
            updated_at: now,
        });
        keep_unless_blank(&mut profile.phone, self.phone);
        keep_unless_blank(&mut profile.full_name, self.full_name);
        keep_unless_blank(&mut profile.city, self.city);
        keep_unless_blank(&mut profile.speaker, self.speaker);
        profile.updated_at = now;
        profile
    }
}

fn keep_unless_blank(slot: &mut String, value: String) {
    let value = value.trim();
    if !value.is_empty() {
        *slot = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::ProfileUpdate;
    use crate::domain::lead::ChatId;

    #[test]
    fn merge_keeps_existing_values_for_blank_fields() {
        let created_at = Utc::now();
        let created = ProfileUpdate::contact("+79991234567", "Anna").merge_into(
            ChatId(5),
            None,
            created_at,
        );
        let later = created_at + Duration::seconds(30);
        let merged = ProfileUpdate::course("Alex", "  ").merge_into(ChatId(5), Some(created), later);

        assert_eq!(merged.phone, "+79991234567");
        assert_eq!(merged.full_name, "Anna");
        assert_eq!(merged.speaker, "Alex");
        assert!(merged.city.is_empty());
        assert_eq!(merged.updated_at, later);
    }
}
