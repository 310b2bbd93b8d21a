use chrono::Utc;

use crate::domain::repository::{Sender, TaskStore};
use crate::domain::types::{BatchReport, MAX_BATCH_LIMIT, RetryPolicy, SendFailure, Task, TaskKind};
use crate::error::DeliveryServiceError;

/// Dispatcher: drains one batch of due tasks through the sender.
///
/// Claim → deliver → record, one task at a time. A lost claim race or a
/// delivery failure never aborts the batch; only a task-store error does.
pub struct RunBatchUseCase<T, S>
where
    T: TaskStore,
    S: Sender,
{
    pub tasks: T,
    pub sender: S,
    pub policy: RetryPolicy,
}

impl<T, S> RunBatchUseCase<T, S>
where
    T: TaskStore,
    S: Sender,
{
    pub async fn execute(&self, limit: u64) -> Result<BatchReport, DeliveryServiceError> {
        let limit = limit.clamp(1, MAX_BATCH_LIMIT);
        let due = self.tasks.list_due(limit, Utc::now()).await?;

        let mut report = BatchReport::default();
        for task in due {
            if !self.tasks.try_claim(task.id).await? {
                // Another dispatcher got there first.
                report.skipped += 1;
                continue;
            }
            if deliver_and_record(&self.tasks, &self.sender, &self.policy, &task).await? {
                report.processed += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            processed = report.processed,
            failed = report.failed,
            skipped = report.skipped,
            "dispatch batch finished"
        );
        Ok(report)
    }
}

/// Deliver one claimed task and write the outcome back. Returns whether the
/// delivery succeeded; an `Err` is a task-store failure, not a send failure.
pub(crate) async fn deliver_and_record<T, S>(
    tasks: &T,
    sender: &S,
    policy: &RetryPolicy,
    task: &Task,
) -> Result<bool, DeliveryServiceError>
where
    T: TaskStore,
    S: Sender,
{
    match sender.deliver(task).await {
        Ok(()) => {
            tasks.mark_sent(task.id, Utc::now()).await?;
            tracing::info!(task_id = %task.id, kind = task.kind.as_str(), "task sent");
            Ok(true)
        }
        Err(failure) => {
            // retry_count on the row is attempts already burned; this failure
            // makes it one more.
            let attempt = task.retry_count as u32 + 1;
            if failure.permanent || !policy.should_retry(task.kind, attempt) {
                tasks.mark_dead(task.id, &failure.message).await?;
                tracing::warn!(
                    task_id = %task.id,
                    kind = task.kind.as_str(),
                    attempt,
                    error = %failure.message,
                    "task dead-lettered"
                );
            } else {
                let next_attempt_at = Utc::now() + policy.next_delay(attempt);
                tasks
                    .mark_failed(task.id, &failure.message, next_attempt_at)
                    .await?;
                tracing::warn!(
                    task_id = %task.id,
                    kind = task.kind.as_str(),
                    attempt,
                    next_attempt_at = %next_attempt_at,
                    error = %failure.message,
                    "task delivery failed, will retry"
                );
            }
            Ok(false)
        }
    }
}

/// Retry one task immediately, bypassing its backoff schedule. The normal
/// claim gate still applies, so a task already `sending`, `sent` or `dead`
/// is rejected rather than re-delivered.
pub struct RetryTaskNowUseCase<T, S>
where
    T: TaskStore,
    S: Sender,
{
    pub tasks: T,
    pub sender: S,
    pub policy: RetryPolicy,
}

impl<T, S> RetryTaskNowUseCase<T, S>
where
    T: TaskStore,
    S: Sender,
{
    pub async fn execute(&self, task_id: uuid::Uuid) -> Result<Task, DeliveryServiceError> {
        let task = self
            .tasks
            .find(task_id)
            .await?
            .ok_or(DeliveryServiceError::TaskNotFound)?;
        if !task.status.is_claimable() {
            return Err(DeliveryServiceError::TaskNotClaimable);
        }
        if !self.tasks.try_claim(task_id).await? {
            return Err(DeliveryServiceError::TaskNotClaimable);
        }

        deliver_and_record(&self.tasks, &self.sender, &self.policy, &task).await?;

        // Reload so the caller sees the recorded outcome.
        self.tasks
            .find(task_id)
            .await?
            .ok_or(DeliveryServiceError::TaskNotFound)
    }
}

/// Routes each task to the sender responsible for its kind.
pub struct KindSender<M, P>
where
    M: Sender,
    P: Sender,
{
    pub mail: M,
    pub panel_sync: P,
}

impl<M, P> Sender for KindSender<M, P>
where
    M: Sender,
    P: Sender,
{
    async fn deliver(&self, task: &Task) -> Result<(), SendFailure> {
        match task.kind {
            TaskKind::NotificationEmail | TaskKind::InvoiceReminder => {
                self.mail.deliver(task).await
            }
            TaskKind::PanelSync => self.panel_sync.deliver(task).await,
        }
    }
}
