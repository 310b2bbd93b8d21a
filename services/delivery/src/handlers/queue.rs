use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use croft_auth_types::identity::IdentityHeaders;
use croft_domain::user::UserRole;

use crate::domain::repository::{CustomerDirectory, TaskStore};
use crate::domain::types::{BatchReport, DEFAULT_BATCH_LIMIT, QueueStats, ScheduleReport, Task};
use crate::error::DeliveryServiceError;
use crate::state::AppState;
use crate::usecase::dispatch::{RetryTaskNowUseCase, RunBatchUseCase};
use crate::usecase::schedule::ScheduleRemindersUseCase;
use crate::usecase::sync::sync_task;

fn require_admin(identity: &IdentityHeaders) -> Result<(), DeliveryServiceError> {
    if identity.user_role < UserRole::Admin.as_u8() {
        return Err(DeliveryServiceError::Forbidden);
    }
    Ok(())
}

// ── POST /queue/run ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RunBatchQuery {
    pub limit: Option<u64>,
}

pub async fn run_batch(
    identity: IdentityHeaders,
    State(state): State<AppState>,
    Query(query): Query<RunBatchQuery>,
) -> Result<Json<BatchReport>, DeliveryServiceError> {
    require_admin(&identity)?;
    let report = RunBatchUseCase {
        tasks: state.task_store(),
        sender: state.sender(),
        policy: state.retry_policy.clone(),
    }
    .execute(query.limit.unwrap_or(DEFAULT_BATCH_LIMIT))
    .await?;
    Ok(Json(report))
}

// ── POST /queue/schedule ─────────────────────────────────────────────────────

pub async fn schedule_now(
    identity: IdentityHeaders,
    State(state): State<AppState>,
) -> Result<Json<ScheduleReport>, DeliveryServiceError> {
    require_admin(&identity)?;
    let report = ScheduleRemindersUseCase {
        services: state.service_directory(),
        invoices: state.invoice_directory(),
        tasks: state.task_store(),
    }
    .execute()
    .await?;
    Ok(Json(report))
}

// ── GET /queue/stats ─────────────────────────────────────────────────────────

pub async fn queue_stats(
    identity: IdentityHeaders,
    State(state): State<AppState>,
) -> Result<Json<QueueStats>, DeliveryServiceError> {
    require_admin(&identity)?;
    let stats = state.task_store().stats().await?;
    Ok(Json(stats))
}

// ── POST /queue/sync/{customer_id} ───────────────────────────────────────────

#[derive(Serialize)]
pub struct EnqueueSyncResponse {
    /// `false` when an identical sync trigger was already queued this minute.
    pub scheduled: bool,
}

/// Queue a control-panel sync for one customer. Enqueue-only: the task rides
/// the normal dispatch pipeline, so a failing panel does not fail this call.
pub async fn enqueue_sync(
    identity: IdentityHeaders,
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<(StatusCode, Json<EnqueueSyncResponse>), DeliveryServiceError> {
    require_admin(&identity)?;
    if state
        .customer_directory()
        .find_profile(customer_id)
        .await?
        .is_none()
    {
        return Err(DeliveryServiceError::CustomerNotFound);
    }
    let scheduled = state
        .task_store()
        .enqueue(&sync_task(customer_id, chrono::Utc::now()))
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueSyncResponse { scheduled }),
    ))
}

// ── POST /queue/tasks/{task_id}/retry ────────────────────────────────────────

#[derive(Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub kind: &'static str,
    pub status: &'static str,
    pub retry_count: i32,
    pub last_error: Option<String>,
    #[serde(serialize_with = "croft_core::serde::to_rfc3339_ms_opt")]
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(serialize_with = "croft_core::serde::to_rfc3339_ms_opt")]
    pub sent_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.to_string(),
            kind: task.kind.as_str(),
            status: task.status.as_str(),
            retry_count: task.retry_count,
            last_error: task.last_error,
            scheduled_at: task.scheduled_at,
            sent_at: task.sent_at,
        }
    }
}

/// Immediate retry, skipping the backoff schedule. Responds with the task's
/// state after the attempt; a failed attempt is a 200 with the recorded
/// outcome, not an error.
pub async fn retry_task(
    identity: IdentityHeaders,
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResponse>, DeliveryServiceError> {
    require_admin(&identity)?;
    let task = RetryTaskNowUseCase {
        tasks: state.task_store(),
        sender: state.sender(),
        policy: state.retry_policy.clone(),
    }
    .execute(task_id)
    .await?;
    Ok(Json(task.into()))
}
