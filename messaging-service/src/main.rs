use std::sync::Arc;
use std::time::Duration;

use jwt_security::TokenRevocationLedger;
use messaging_service::{
    config, db, error, events::EventPublisher, logging, migrations, routes,
    services::notification_service::NotificationService, services::search_trends::SearchTrends,
    state::AppState,
};
use redis_utils::RedisKeyedExpiryStore;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let db = db::init_pool(&cfg.database_url)
        .await
        .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;

    // The schema must be in sync before serving traffic
    migrations::run_all(&db)
        .await
        .map_err(|e| error::AppError::StartServer(format!("database migrations failed: {e}")))?;

    // One Redis attempt, shared by the publisher, search trends and the
    // revocation ledger's durable backend. The service runs fine without it:
    // no live delivery, no popularity ranking, in-process revocation only.
    let redis = match redis_utils::connect(&cfg.redis_url).await {
        Ok(conn) => Some(conn),
        Err(e) => {
            tracing::warn!(error = %e, "redis unreachable, running in degraded mode");
            None
        }
    };

    let events = Arc::new(EventPublisher::new(
        redis.clone(),
        Duration::from_millis(cfg.publish_timeout_ms),
    ));
    let trends = Arc::new(SearchTrends::new(redis.clone()));

    let durable_revocations = redis
        .map(|conn| Arc::new(RedisKeyedExpiryStore::new(conn)) as Arc<dyn redis_utils::KeyedExpiryStore>);
    let revocations = Arc::new(TokenRevocationLedger::new(durable_revocations));
    revocations.spawn_sweeper(Duration::from_secs(cfg.revocation_sweep_interval_secs));
    tracing::info!(stats = ?revocations.stats().await, "revocation ledger ready");

    // Notification retention sweep
    {
        let db = db.clone();
        let retention_days = cfg.notification_retention_days;
        let interval = Duration::from_secs(cfg.retention_sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match NotificationService::prune_older_than(&db, retention_days).await {
                    Ok(0) => {}
                    Ok(pruned) => tracing::info!(pruned, "pruned stale notifications"),
                    Err(e) => tracing::warn!(error = %e, "notification retention sweep failed"),
                }
            }
        });
    }

    let state = AppState {
        db,
        config: cfg.clone(),
        events,
        trends,
        revocations,
    };

    let app = routes::build_router().with_state(state);

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting messaging-service");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
