use crate::domain::types::{
    DEFAULT_EMAIL_MAX_ATTEMPTS, DEFAULT_RETRY_BASE_SECS, DEFAULT_SYNC_MAX_ATTEMPTS,
    STALE_SENDING_SECS,
};

/// Delivery service configuration loaded from environment variables.
#[derive(Debug)]
pub struct DeliveryConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port for the HTTP server (default 3114). Env var: `DELIVERY_PORT`.
    pub delivery_port: u16,
    /// Shared secret presented by the external cron caller.
    pub cron_token: String,
    /// Base URL of the transactional mail API (e.g. "https://mail.example.com/v1").
    pub mail_api_url: String,
    pub mail_api_key: String,
    /// Sender address for all outbound notices.
    pub mail_from: String,
    /// Base URL of the hosting control-panel API.
    pub panel_base_url: String,
    pub panel_api_key: String,
    /// Retry ceiling for email task kinds. Env var: `EMAIL_MAX_ATTEMPTS`.
    pub email_max_attempts: u32,
    /// Retry ceiling for panel sync tasks. Env var: `SYNC_MAX_ATTEMPTS`.
    pub sync_max_attempts: u32,
    /// Base backoff delay in seconds. Env var: `RETRY_BASE_SECS`.
    pub retry_base_secs: i64,
    /// Age in seconds after which a `sending` task is presumed orphaned.
    /// Env var: `STALE_SENDING_SECS`.
    pub stale_sending_secs: i64,
}

impl DeliveryConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL"),
            delivery_port: std::env::var("DELIVERY_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3114),
            cron_token: std::env::var("CRON_TOKEN").expect("CRON_TOKEN"),
            mail_api_url: std::env::var("MAIL_API_URL").expect("MAIL_API_URL"),
            mail_api_key: std::env::var("MAIL_API_KEY").expect("MAIL_API_KEY"),
            mail_from: std::env::var("MAIL_FROM").expect("MAIL_FROM"),
            panel_base_url: std::env::var("PANEL_BASE_URL").expect("PANEL_BASE_URL"),
            panel_api_key: std::env::var("PANEL_API_KEY").expect("PANEL_API_KEY"),
            email_max_attempts: std::env::var("EMAIL_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_EMAIL_MAX_ATTEMPTS),
            sync_max_attempts: std::env::var("SYNC_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SYNC_MAX_ATTEMPTS),
            retry_base_secs: std::env::var("RETRY_BASE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETRY_BASE_SECS),
            stale_sending_secs: std::env::var("STALE_SENDING_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(STALE_SENDING_SECS),
        }
    }
}
