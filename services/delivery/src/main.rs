use sea_orm::Database;
use tracing::info;

use croft_core::tracing::init_tracing;
use croft_delivery::config::DeliveryConfig;
use croft_delivery::domain::types::RetryPolicy;
use croft_delivery::router::build_router;
use croft_delivery::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = DeliveryConfig::from_env();

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("failed to build HTTP client");

    let state = AppState {
        db,
        http,
        cron_token: config.cron_token,
        mail_api_url: config.mail_api_url,
        mail_api_key: config.mail_api_key,
        mail_from: config.mail_from,
        panel_base_url: config.panel_base_url,
        panel_api_key: config.panel_api_key,
        retry_policy: RetryPolicy {
            email_max_attempts: config.email_max_attempts,
            sync_max_attempts: config.sync_max_attempts,
            base_delay_secs: config.retry_base_secs,
            multiplier: 2.0,
        },
        stale_sending_secs: config.stale_sending_secs,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.delivery_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("delivery service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
