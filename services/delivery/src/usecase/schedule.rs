use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::domain::repository::{InvoiceDirectory, ServiceDirectory, TaskStore};
use crate::domain::types::{
    DELETION_GRACE_DAYS, DueInvoice, EXPIRED_LOOKBACK_DAYS, EXPIRY_WARNING_DAYS, ExpiringService,
    INVOICE_DUE_SOON_DAYS, NewTask, ScheduleReport, TaskKind,
};
use crate::error::DeliveryServiceError;

/// Scheduler: translates CRM timing rules into task rows, exactly once per
/// (entity, rule, period).
///
/// Inserts only — it never sends anything itself. Idempotency comes from the
/// task store's unique idempotency key: re-running for the same period
/// enqueues nothing new.
pub struct ScheduleRemindersUseCase<S, I, T>
where
    S: ServiceDirectory,
    I: InvoiceDirectory,
    T: TaskStore,
{
    pub services: S,
    pub invoices: I,
    pub tasks: T,
}

impl<S, I, T> ScheduleRemindersUseCase<S, I, T>
where
    S: ServiceDirectory,
    I: InvoiceDirectory,
    T: TaskStore,
{
    pub async fn execute(&self) -> Result<ScheduleReport, DeliveryServiceError> {
        let now = Utc::now();
        let mut report = ScheduleReport::default();

        // 1. Services expiring within the warning window.
        for service in self.services.list_expiring(now, EXPIRY_WARNING_DAYS).await? {
            let task = expiry_notice(&service, "service_expiring", expiring_email(&service));
            self.enqueue_counted(task, &mut report.expiring, &mut report.skipped)
                .await;
        }

        // 2. Services that just expired.
        for service in self
            .services
            .list_just_expired(now, EXPIRED_LOOKBACK_DAYS)
            .await?
        {
            let task = expiry_notice(&service, "service_expired", expired_email(&service));
            self.enqueue_counted(task, &mut report.expired, &mut report.skipped)
                .await;
        }

        // 3. Services past the deletion grace window.
        for service in self
            .services
            .list_pending_deletion(now, DELETION_GRACE_DAYS)
            .await?
        {
            let task = expiry_notice(
                &service,
                "service_deletion_warning",
                deletion_warning_email(&service),
            );
            self.enqueue_counted(task, &mut report.deletion_warning, &mut report.skipped)
                .await;
        }

        // 4. Invoices due soon.
        for invoice in self
            .invoices
            .list_due_within(now, INVOICE_DUE_SOON_DAYS)
            .await?
        {
            let task = invoice_reminder(&invoice);
            self.enqueue_counted(task, &mut report.invoice_reminders, &mut report.skipped)
                .await;
        }

        tracing::info!(
            scheduled = report.total_scheduled(),
            skipped = report.skipped,
            "scheduler run finished"
        );
        Ok(report)
    }

    /// Enqueue one task; a duplicate idempotency key counts as nothing-to-do
    /// and a store error is isolated to this entity (logged + skipped).
    async fn enqueue_counted(&self, task: NewTask, scheduled: &mut u64, skipped: &mut u64) {
        match self.tasks.enqueue(&task).await {
            Ok(true) => *scheduled += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    idempotency_key = %task.idempotency_key,
                    error = %e,
                    "skipping entity: enqueue failed"
                );
                *skipped += 1;
            }
        }
    }
}

// ── Task construction ────────────────────────────────────────────────────────

fn expiry_notice(
    service: &ExpiringService,
    rule: &str,
    (subject, body): (String, String),
) -> NewTask {
    NewTask {
        id: Uuid::new_v4(),
        kind: TaskKind::NotificationEmail,
        payload: json!({
            "to": service.contact_email,
            "subject": subject,
            "body": body,
        }),
        idempotency_key: format!(
            "{rule}:{}:{}",
            service.id,
            service.expires_at.date_naive()
        ),
        scheduled_at: None,
    }
}

fn invoice_reminder(invoice: &DueInvoice) -> NewTask {
    let amount = format!(
        "{}.{:02} {}",
        invoice.amount_cents / 100,
        invoice.amount_cents % 100,
        invoice.currency
    );
    NewTask {
        id: Uuid::new_v4(),
        kind: TaskKind::InvoiceReminder,
        payload: json!({
            "to": invoice.contact_email,
            "subject": format!("Invoice {} is due on {}", invoice.number, invoice.due_at.date_naive()),
            "body": format!(
                "Invoice {} over {} is due on {}. Please arrange payment to avoid service interruption.",
                invoice.number, amount, invoice.due_at.date_naive()
            ),
        }),
        idempotency_key: format!("invoice_reminder:{}:{}", invoice.id, invoice.due_at.date_naive()),
        scheduled_at: None,
    }
}

fn expiring_email(service: &ExpiringService) -> (String, String) {
    (
        format!(
            "Your service {} expires on {}",
            service.domain,
            service.expires_at.date_naive()
        ),
        format!(
            "The hosting service for {} expires on {}. Renew it to keep the service running.",
            service.domain,
            service.expires_at.date_naive()
        ),
    )
}

fn expired_email(service: &ExpiringService) -> (String, String) {
    (
        format!("Your service {} has expired", service.domain),
        format!(
            "The hosting service for {} expired on {}. Renew it within {} days to avoid deletion.",
            service.domain,
            service.expires_at.date_naive(),
            DELETION_GRACE_DAYS
        ),
    )
}

fn deletion_warning_email(service: &ExpiringService) -> (String, String) {
    (
        format!("Final notice: {} is scheduled for deletion", service.domain),
        format!(
            "The hosting service for {} expired on {} and its grace period has run out. \
             It will be deleted shortly unless it is renewed.",
            service.domain,
            service.expires_at.date_naive()
        ),
    )
}
