//! Popular-search-term tracking over a Redis sorted set.
//!
//! Purely best-effort: recording is fire-and-forget and ranking reads come
//! back empty when Redis is absent, so search itself never depends on this.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

const POPULAR_TERMS_KEY: &str = "search:popular_terms";

pub struct SearchTrends {
    conn: Option<ConnectionManager>,
}

impl SearchTrends {
    pub fn new(conn: Option<ConnectionManager>) -> Self {
        Self { conn }
    }

    /// Bump the popularity score of a search term.
    pub fn record(&self, term: &str) {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return;
        }
        let Some(conn) = self.conn.clone() else {
            debug!("search trends disabled, not recording term");
            return;
        };

        tokio::spawn(async move {
            let mut conn = conn;
            if let Err(e) = conn
                .zincr::<_, _, _, ()>(POPULAR_TERMS_KEY, &term, 1)
                .await
            {
                warn!(error = %e, "failed to record search term");
            }
        });
    }

    /// The highest-scored search terms, best first. Empty when Redis is
    /// unavailable.
    pub async fn popular(&self, limit: usize) -> Vec<(String, f64)> {
        let Some(conn) = self.conn.clone() else {
            return Vec::new();
        };
        let mut conn = conn;
        let stop = limit.saturating_sub(1) as isize;
        match conn
            .zrevrange_withscores::<_, Vec<(String, f64)>>(POPULAR_TERMS_KEY, 0, stop)
            .await
        {
            Ok(terms) => terms,
            Err(e) => {
                warn!(error = %e, "failed to fetch popular search terms");
                Vec::new()
            }
        }
    }
}
