use sqlx::{Pool, Postgres};

// Embed SQL migrations at compile time for deterministic startup
const MIG_0001: &str = include_str!("../migrations/0001_create_conversations.sql");
const MIG_0002: &str = include_str!("../migrations/0002_create_messages.sql");
const MIG_0003: &str = include_str!("../migrations/0003_create_notifications.sql");

pub async fn run_all(db: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    // Run sequentially; each migration may contain multiple statements
    for (i, sql) in [MIG_0001, MIG_0002, MIG_0003].into_iter().enumerate() {
        let label = i + 1;
        match sqlx::raw_sql(sql).execute(db).await {
            Ok(_) => tracing::info!(migration = %label, "messaging-service migration applied"),
            Err(e) => {
                // Statements are IF NOT EXISTS; anything else is a real failure
                tracing::error!(migration = %label, error = %e, "migration failed");
                return Err(e);
            }
        }
    }
    Ok(())
}
