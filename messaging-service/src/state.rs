use crate::{config::Config, events::EventPublisher, services::search_trends::SearchTrends};
use jwt_security::TokenRevocationLedger;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Pool<Postgres>,
    pub config: Arc<Config>,
    pub events: Arc<EventPublisher>,
    pub trends: Arc<SearchTrends>,
    pub revocations: Arc<TokenRevocationLedger>,
}
