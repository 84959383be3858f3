use serde::{Deserialize, Serialize};

/// Stable identifier of one end-user conversation on the messaging platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lead data accumulated for a chat before it is pushed to the CRM.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSession {
    pub phone: String,
    pub speaker_name: String,
    pub city: String,
    pub contact_name: String,
}

/// Partial update for a [`LeadSession`]. Blank values are skipped when applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub phone: Option<String>,
    pub speaker_name: Option<String>,
    pub city: Option<String>,
    pub contact_name: Option<String>,
}

impl SessionPatch {
    pub fn contact(phone: impl Into<String>, contact_name: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            contact_name: Some(contact_name.into()),
            ..Self::default()
        }
    }

    pub fn course(speaker_name: impl Into<String>, city: impl Into<String>) -> Self {
        Self { speaker_name: Some(speaker_name.into()), city: Some(city.into()), ..Self::default() }
    }
}

impl LeadSession {
    pub fn apply(&mut self, patch: SessionPatch) {
        replace_if_present(&mut self.phone, patch.phone);
        replace_if_present(&mut self.speaker_name, patch.speaker_name);
        replace_if_present(&mut self.city, patch.city);
        replace_if_present(&mut self.contact_name, patch.contact_name);
    }

    /// Phone and city are both required before a lead can be pushed.
    pub fn is_ready(&self) -> bool {
        !self.phone.trim().is_empty() && !self.city.trim().is_empty()
    }
}

fn replace_if_present(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        if !value.trim().is_empty() {
            *slot = value;
        }
    }
}

/// Identifiers returned by the CRM after a successful sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealRef {
    pub contact_id: String,
    pub item_id: String,
}
