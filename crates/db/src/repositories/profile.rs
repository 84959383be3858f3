use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use leadbot_core::domain::lead::ChatId;
use leadbot_core::domain::profile::{ChatProfile, ProfileUpdate};

use super::{ProfileRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProfileRepository {
    pool: DbPool,
}

impl SqlProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileRepository for SqlProfileRepository {
    async fn upsert(&self, chat_id: ChatId, update: ProfileUpdate) -> Result<(), RepositoryError> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO chat_profile (chat_id, phone, full_name, city, speaker, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(chat_id) DO UPDATE SET
                phone = COALESCE(NULLIF(excluded.phone, ''), chat_profile.phone),
                full_name = COALESCE(NULLIF(excluded.full_name, ''), chat_profile.full_name),
                city = COALESCE(NULLIF(excluded.city, ''), chat_profile.city),
                speaker = COALESCE(NULLIF(excluded.speaker, ''), chat_profile.speaker),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(chat_id.0)
        .bind(update.phone.trim())
        .bind(update.full_name.trim())
        .bind(update.city.trim())
        .bind(update.speaker.trim())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(event_name = "db.profile.upserted", chat_id = %chat_id, "saved chat profile");
        Ok(())
    }

    async fn find_by_chat_id(
        &self,
        chat_id: ChatId,
    ) -> Result<Option<ChatProfile>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT chat_id, phone, full_name, city, speaker, updated_at
            FROM chat_profile
            WHERE chat_id = ?
            "#,
        )
        .bind(chat_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(profile_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<ChatProfile>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT chat_id, phone, full_name, city, speaker, updated_at
            FROM chat_profile
            ORDER BY chat_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(profile_from_row).collect()
    }
}

fn profile_from_row(row: &SqliteRow) -> Result<ChatProfile, RepositoryError> {
    let updated_at: String = row.try_get("updated_at")?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid updated_at `{updated_at}`: {error}"))
        })?
        .with_timezone(&Utc);

    Ok(ChatProfile {
        chat_id: ChatId(row.try_get("chat_id")?),
        phone: row.try_get("phone")?,
        full_name: row.try_get("full_name")?,
        city: row.try_get("city")?,
        speaker: row.try_get("speaker")?,
        updated_at,
    })
}
