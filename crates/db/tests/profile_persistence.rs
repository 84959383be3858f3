use leadbot_core::domain::lead::ChatId;
use leadbot_core::domain::profile::ProfileUpdate;
use leadbot_db::{connect_with_settings, migrations, ProfileRepository, SqlProfileRepository};
use tempfile::TempDir;

#[tokio::test]
async fn profiles_survive_reconnect_and_merge_partial_answers() {
    let dir = TempDir::new().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("leadbot.db").display());

    let pool = connect_with_settings(&url, 2, 5).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    let repository = SqlProfileRepository::new(pool.clone());

    repository.upsert(ChatId(1), ProfileUpdate::course("Alex", "Moscow")).await.expect("course");
    repository
        .upsert(ChatId(1), ProfileUpdate::contact("  +79991234567 ", "Anna"))
        .await
        .expect("contact");
    repository.upsert(ChatId(2), ProfileUpdate::speaker("Zoya")).await.expect("speaker");
    pool.close().await;

    let pool = connect_with_settings(&url, 1, 5).await.expect("reconnect");
    migrations::run_pending(&pool).await.expect("migrations are idempotent");
    let repository = SqlProfileRepository::new(pool.clone());

    let first = repository.find_by_chat_id(ChatId(1)).await.expect("find").expect("stored");
    assert_eq!(first.phone, "+79991234567");
    assert_eq!(first.full_name, "Anna");
    assert_eq!(first.speaker, "Alex");
    assert_eq!(first.city, "Moscow");

    let all = repository.list_all().await.expect("list");
    let chat_ids: Vec<ChatId> = all.iter().map(|profile| profile.chat_id).collect();
    assert_eq!(chat_ids, vec![ChatId(1), ChatId(2)]);
    assert_eq!(all[1].city, "");

    pool.close().await;
}
