use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use croft_core::health::{healthz, readyz};
use croft_core::middleware::request_id_layer;

use crate::handlers::cron::run_cron;
use crate::handlers::queue::{enqueue_sync, queue_stats, retry_task, run_batch, schedule_now};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Cron trigger (token auth)
        .route("/cron/run", post(run_cron))
        // Admin queue surface (identity headers)
        .route("/queue/run", post(run_batch))
        .route("/queue/schedule", post(schedule_now))
        .route("/queue/stats", get(queue_stats))
        .route("/queue/sync/{customer_id}", post(enqueue_sync))
        .route("/queue/tasks/{task_id}/retry", post(retry_task))
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
