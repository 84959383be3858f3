use std::path::Path;

use leadbot_core::domain::profile::ChatProfile;
use leadbot_db::{
    connect_with_settings, DbPool, ProfileRepository, RepositoryError, SqlProfileRepository,
};
use serde::Serialize;

use crate::commands::{load_config, runtime, CommandResult, EXIT_DATABASE, EXIT_EXPORT};

#[derive(Debug, Serialize)]
struct ProfileRow<'a> {
    chat_id: i64,
    phone: &'a str,
    full_name: &'a str,
    city: &'a str,
    speaker: &'a str,
    updated_at: String,
}

impl<'a> From<&'a ChatProfile> for ProfileRow<'a> {
    fn from(profile: &'a ChatProfile) -> Self {
        Self {
            chat_id: profile.chat_id.0,
            phone: &profile.phone,
            full_name: &profile.full_name,
            city: &profile.city,
            speaker: &profile.speaker,
            updated_at: profile.updated_at.to_rfc3339(),
        }
    }
}

pub fn run(output: &Path) -> CommandResult {
    let config = match load_config("export") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("export") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let profiles = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        read_and_close(pool)
            .await
            .map_err(|error| ("db_query", error.to_string(), EXIT_DATABASE))
    });

    let profiles: Vec<ChatProfile> = match profiles {
        Ok(profiles) => profiles,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("export", error_class, message, exit_code);
        }
    };

    match write_csv(output, &profiles) {
        Ok(()) => CommandResult::success(
            "export",
            format!("exported {} profiles to {}", profiles.len(), output.display()),
        ),
        Err(error) => CommandResult::failure("export", "csv_write", error.to_string(), EXIT_EXPORT),
    }
}

/// Lists every stored profile, closing the pool whether or not the query succeeds.
async fn read_and_close(pool: DbPool) -> Result<Vec<ChatProfile>, RepositoryError> {
    let profiles = SqlProfileRepository::new(pool.clone()).list_all().await;
    pool.close().await;
    profiles
}

/// Header row is written even when there are no profiles.
pub fn write_csv(output: &Path, profiles: &[ChatProfile]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(output)?;
    if profiles.is_empty() {
        writer.write_record(["chat_id", "phone", "full_name", "city", "speaker", "updated_at"])?;
    }
    for profile in profiles {
        writer.serialize(ProfileRow::from(profile))?;
    }
    writer.flush()?;
    Ok(())
}
