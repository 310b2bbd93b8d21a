use axum::Json;
use axum::extract::{Query, State};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::repository::TaskStore;
use crate::domain::types::{BatchReport, DEFAULT_BATCH_LIMIT, ScheduleReport};
use crate::error::DeliveryServiceError;
use crate::state::AppState;
use crate::usecase::dispatch::RunBatchUseCase;
use crate::usecase::schedule::ScheduleRemindersUseCase;

// ── POST /cron/run ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CronRunQuery {
    /// Alternative to the Authorization header, for cron providers that
    /// cannot set headers.
    pub token: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Serialize)]
pub struct CronRunResponse {
    /// Stale `sending` tasks returned to the claimable pool.
    pub reclaimed: u64,
    pub schedule: ScheduleReport,
    pub batch: BatchReport,
}

/// One full pipeline tick: reclaim stale claims, materialize scheduled tasks,
/// dispatch a batch. Driven by an external cron caller.
pub async fn run_cron(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<CronRunQuery>,
) -> Result<Json<CronRunResponse>, DeliveryServiceError> {
    verify_cron_token(
        bearer.as_ref().map(|TypedHeader(auth)| auth.token()),
        query.token.as_deref(),
        &state.cron_token,
    )?;

    let cutoff = Utc::now() - Duration::seconds(state.stale_sending_secs);
    let reclaimed = state.task_store().release_stale(cutoff).await?;
    if reclaimed > 0 {
        tracing::warn!(reclaimed, "reclaimed stale sending tasks");
    }

    let schedule = ScheduleRemindersUseCase {
        services: state.service_directory(),
        invoices: state.invoice_directory(),
        tasks: state.task_store(),
    }
    .execute()
    .await?;

    let batch = RunBatchUseCase {
        tasks: state.task_store(),
        sender: state.sender(),
        policy: state.retry_policy.clone(),
    }
    .execute(query.limit.unwrap_or(DEFAULT_BATCH_LIMIT))
    .await?;

    Ok(Json(CronRunResponse {
        reclaimed,
        schedule,
        batch,
    }))
}

/// The header wins when both are present; either one must match exactly.
fn verify_cron_token(
    bearer: Option<&str>,
    query: Option<&str>,
    expected: &str,
) -> Result<(), DeliveryServiceError> {
    let presented = bearer
        .or(query)
        .ok_or(DeliveryServiceError::Unauthorized)?;
    if presented != expected {
        return Err(DeliveryServiceError::Unauthorized);
    }
    Ok(())
}
