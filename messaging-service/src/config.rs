use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    /// Notifications older than this are deleted by the retention sweep
    pub notification_retention_days: i64,
    pub retention_sweep_interval_secs: u64,
    /// Upper bound for a single pub/sub publish; a hung Redis must not hold
    /// the request path
    pub publish_timeout_ms: u64,
    pub revocation_sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, crate::error::AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| crate::error::AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let notification_retention_days = env::var("NOTIFICATION_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(90);
        let retention_sweep_interval_secs = env::var("RETENTION_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);
        let publish_timeout_ms = env::var("PUBLISH_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        let revocation_sweep_interval_secs = env::var("REVOCATION_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        Ok(Self {
            database_url,
            redis_url,
            port,
            notification_retention_days,
            retention_sweep_interval_secs,
            publish_timeout_ms,
            revocation_sweep_interval_secs,
        })
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            port: 3000,
            notification_retention_days: 90,
            retention_sweep_interval_secs: 3600,
            publish_timeout_ms: 500,
            revocation_sweep_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn missing_database_url_is_config_error() {
        std::env::remove_var("DATABASE_URL");
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn defaults_applied_for_optional_vars() {
        std::env::set_var("DATABASE_URL", "postgres://localhost/test");
        std::env::remove_var("REDIS_URL");
        std::env::remove_var("PORT");
        std::env::remove_var("NOTIFICATION_RETENTION_DAYS");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.notification_retention_days, 90);
        assert_eq!(cfg.publish_timeout_ms, 500);

        std::env::remove_var("DATABASE_URL");
    }
}
