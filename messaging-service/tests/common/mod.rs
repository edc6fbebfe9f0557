use std::sync::Arc;
use std::time::Duration;

use jwt_security::TokenRevocationLedger;
use messaging_service::config::Config;
use messaging_service::events::EventPublisher;
use messaging_service::services::search_trends::SearchTrends;
use messaging_service::state::AppState;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

/// Connect to the test database, or `None` so callers can skip.
///
/// Points at `TEST_DATABASE_URL` (falling back to `DATABASE_URL`) and runs
/// the embedded migrations.
pub async fn test_pool() -> Option<Pool<Postgres>> {
    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .ok()?;
    messaging_service::migrations::run_all(&pool).await.ok()?;
    Some(pool)
}

/// App state over the test database with all optional backends disabled.
pub async fn test_state() -> Option<AppState> {
    let db = test_pool().await?;
    let config = Config {
        database_url: String::new(),
        redis_url: String::new(),
        port: 0,
        notification_retention_days: 90,
        retention_sweep_interval_secs: 3600,
        publish_timeout_ms: 500,
        revocation_sweep_interval_secs: 60,
    };
    Some(AppState {
        db,
        config: Arc::new(config),
        events: Arc::new(EventPublisher::new(None, Duration::from_millis(500))),
        trends: Arc::new(SearchTrends::new(None)),
        revocations: Arc::new(TokenRevocationLedger::new(None)),
    })
}
