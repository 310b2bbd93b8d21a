use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, NullOrdering, OnConflict},
};
use uuid::Uuid;

use croft_delivery_schema::{customers, hosting_services, invoices, sync_accounts, tasks};

use crate::domain::repository::{
    CustomerDirectory, InvoiceDirectory, ServiceDirectory, SyncAccountStore, TaskStore,
};
use crate::domain::types::{
    CustomerProfile, DueInvoice, ExpiringService, NewTask, QueueStats, SyncAccount, Task,
    TaskKind, TaskStatus,
};
use crate::error::DeliveryServiceError;

// ── Task store ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbTaskStore {
    pub db: DatabaseConnection,
}

impl TaskStore for DbTaskStore {
    async fn enqueue(&self, task: &NewTask) -> Result<bool, DeliveryServiceError> {
        let now = Utc::now();
        let inserted = tasks::Entity::insert(tasks::ActiveModel {
            id: Set(task.id),
            kind: Set(task.kind.as_str().to_owned()),
            payload: Set(task.payload.clone()),
            idempotency_key: Set(task.idempotency_key.clone()),
            status: Set(TaskStatus::Pending.as_str().to_owned()),
            scheduled_at: Set(task.scheduled_at),
            sent_at: Set(None),
            retry_count: Set(0),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(tasks::Column::IdempotencyKey)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("enqueue task")?;
        // 0 rows means the idempotency key already exists.
        Ok(inserted == 1)
    }

    async fn list_due(
        &self,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, DeliveryServiceError> {
        let models = tasks::Entity::find()
            .filter(tasks::Column::Status.is_in(claimable_statuses()))
            .filter(
                Condition::any()
                    .add(tasks::Column::ScheduledAt.is_null())
                    .add(tasks::Column::ScheduledAt.lte(now)),
            )
            .order_by_with_nulls(tasks::Column::ScheduledAt, Order::Asc, NullOrdering::First)
            .order_by_asc(tasks::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .context("list due tasks")?;
        models.into_iter().map(task_from_model).collect()
    }

    async fn try_claim(&self, id: Uuid) -> Result<bool, DeliveryServiceError> {
        // Conditional update is the lock: only one concurrent caller sees
        // rows_affected == 1 for a given claimable row.
        let result = tasks::Entity::update_many()
            .col_expr(
                tasks::Column::Status,
                Expr::value(TaskStatus::Sending.as_str()),
            )
            .col_expr(tasks::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tasks::Column::Id.eq(id))
            .filter(tasks::Column::Status.is_in(claimable_statuses()))
            .exec(&self.db)
            .await
            .context("claim task")?;
        Ok(result.rows_affected == 1)
    }

    async fn mark_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DeliveryServiceError> {
        tasks::Entity::update_many()
            .col_expr(
                tasks::Column::Status,
                Expr::value(TaskStatus::Sent.as_str()),
            )
            .col_expr(tasks::Column::SentAt, Expr::value(now))
            .col_expr(
                tasks::Column::ScheduledAt,
                Expr::value(None::<DateTime<Utc>>),
            )
            .col_expr(tasks::Column::UpdatedAt, Expr::value(now))
            .filter(tasks::Column::Id.eq(id))
            .filter(tasks::Column::Status.eq(TaskStatus::Sending.as_str()))
            .exec(&self.db)
            .await
            .context("mark task sent")?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), DeliveryServiceError> {
        tasks::Entity::update_many()
            .col_expr(
                tasks::Column::Status,
                Expr::value(TaskStatus::Failed.as_str()),
            )
            .col_expr(
                tasks::Column::RetryCount,
                Expr::col(tasks::Column::RetryCount).add(1),
            )
            .col_expr(tasks::Column::LastError, Expr::value(error))
            .col_expr(tasks::Column::ScheduledAt, Expr::value(next_attempt_at))
            .col_expr(tasks::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tasks::Column::Id.eq(id))
            .filter(tasks::Column::Status.eq(TaskStatus::Sending.as_str()))
            .exec(&self.db)
            .await
            .context("mark task failed")?;
        Ok(())
    }

    async fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), DeliveryServiceError> {
        tasks::Entity::update_many()
            .col_expr(
                tasks::Column::Status,
                Expr::value(TaskStatus::Dead.as_str()),
            )
            .col_expr(
                tasks::Column::RetryCount,
                Expr::col(tasks::Column::RetryCount).add(1),
            )
            .col_expr(tasks::Column::LastError, Expr::value(error))
            .col_expr(tasks::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tasks::Column::Id.eq(id))
            .filter(tasks::Column::Status.eq(TaskStatus::Sending.as_str()))
            .exec(&self.db)
            .await
            .context("mark task dead")?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Task>, DeliveryServiceError> {
        let model = tasks::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .context("find task by id")?;
        model.map(task_from_model).transpose()
    }

    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DeliveryServiceError> {
        let result = tasks::Entity::update_many()
            .col_expr(
                tasks::Column::Status,
                Expr::value(TaskStatus::Pending.as_str()),
            )
            .col_expr(tasks::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(tasks::Column::Status.eq(TaskStatus::Sending.as_str()))
            .filter(tasks::Column::UpdatedAt.lt(cutoff))
            .exec(&self.db)
            .await
            .context("release stale tasks")?;
        Ok(result.rows_affected)
    }

    async fn stats(&self) -> Result<QueueStats, DeliveryServiceError> {
        Ok(QueueStats {
            pending: count_status(&self.db, TaskStatus::Pending).await?,
            sending: count_status(&self.db, TaskStatus::Sending).await?,
            sent: count_status(&self.db, TaskStatus::Sent).await?,
            failed: count_status(&self.db, TaskStatus::Failed).await?,
            dead: count_status(&self.db, TaskStatus::Dead).await?,
        })
    }
}

fn claimable_statuses() -> [&'static str; 2] {
    [TaskStatus::Pending.as_str(), TaskStatus::Failed.as_str()]
}

async fn count_status(
    db: &DatabaseConnection,
    status: TaskStatus,
) -> Result<u64, DeliveryServiceError> {
    let count = tasks::Entity::find()
        .filter(tasks::Column::Status.eq(status.as_str()))
        .count(db)
        .await
        .context("count tasks by status")?;
    Ok(count)
}

fn task_from_model(model: tasks::Model) -> Result<Task, DeliveryServiceError> {
    let kind = TaskKind::from_str(&model.kind)
        .ok_or_else(|| anyhow::anyhow!("unknown task kind in store: {}", model.kind))?;
    let status = TaskStatus::from_str(&model.status)
        .ok_or_else(|| anyhow::anyhow!("unknown task status in store: {}", model.status))?;
    Ok(Task {
        id: model.id,
        kind,
        payload: model.payload,
        idempotency_key: model.idempotency_key,
        status,
        scheduled_at: model.scheduled_at,
        sent_at: model.sent_at,
        retry_count: model.retry_count,
        last_error: model.last_error,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

// ── Sync account store ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSyncAccountStore {
    pub db: DatabaseConnection,
}

impl SyncAccountStore for DbSyncAccountStore {
    async fn find_by_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<SyncAccount>, DeliveryServiceError> {
        let model = sync_accounts::Entity::find_by_id(customer_id)
            .one(&self.db)
            .await
            .context("find sync account")?;
        Ok(model.map(|m| SyncAccount {
            customer_id: m.customer_id,
            panel_account_id: m.panel_account_id,
            last_synced_at: m.last_synced_at,
        }))
    }

    async fn upsert(
        &self,
        customer_id: Uuid,
        panel_account_id: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<(), DeliveryServiceError> {
        sync_accounts::Entity::insert(sync_accounts::ActiveModel {
            customer_id: Set(customer_id),
            panel_account_id: Set(panel_account_id.to_owned()),
            last_synced_at: Set(synced_at),
            created_at: Set(synced_at),
            updated_at: Set(synced_at),
        })
        .on_conflict(
            OnConflict::column(sync_accounts::Column::CustomerId)
                .update_columns([
                    sync_accounts::Column::PanelAccountId,
                    sync_accounts::Column::LastSyncedAt,
                    sync_accounts::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("upsert sync account")?;
        Ok(())
    }
}

// ── CRM directories (read-only projections) ──────────────────────────────────

#[derive(Clone)]
pub struct DbCustomerDirectory {
    pub db: DatabaseConnection,
}

impl CustomerDirectory for DbCustomerDirectory {
    async fn find_profile(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<CustomerProfile>, DeliveryServiceError> {
        let model = customers::Entity::find_by_id(customer_id)
            .one(&self.db)
            .await
            .context("find customer profile")?;
        Ok(model.map(|m| CustomerProfile {
            id: m.id,
            email: m.email,
            name: m.name,
            company: m.company,
        }))
    }
}

#[derive(Clone)]
pub struct DbServiceDirectory {
    pub db: DatabaseConnection,
}

impl DbServiceDirectory {
    /// Live services (not torn down) joined with the owning customer, filtered
    /// by an `expires_at` window.
    async fn list_in_window(
        &self,
        window: Condition,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError> {
        let rows = hosting_services::Entity::find()
            .find_also_related(customers::Entity)
            .filter(hosting_services::Column::DeletedAt.is_null())
            .filter(window)
            .order_by_asc(hosting_services::Column::ExpiresAt)
            .all(&self.db)
            .await
            .context("list hosting services")?;

        let mut services = Vec::with_capacity(rows.len());
        for (service, customer) in rows {
            let Some(customer) = customer else {
                // Orphaned service row; nothing to address a notice to.
                tracing::warn!(service_id = %service.id, "hosting service has no customer");
                continue;
            };
            services.push(ExpiringService {
                id: service.id,
                customer_id: service.customer_id,
                domain: service.domain,
                expires_at: service.expires_at,
                contact_email: customer.email,
            });
        }
        Ok(services)
    }
}

impl ServiceDirectory for DbServiceDirectory {
    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        within_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError> {
        self.list_in_window(
            Condition::all()
                .add(hosting_services::Column::ExpiresAt.gt(now))
                .add(hosting_services::Column::ExpiresAt.lte(now + Duration::days(within_days))),
        )
        .await
    }

    async fn list_just_expired(
        &self,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError> {
        self.list_in_window(
            Condition::all()
                .add(hosting_services::Column::ExpiresAt.gt(now - Duration::days(lookback_days)))
                .add(hosting_services::Column::ExpiresAt.lte(now)),
        )
        .await
    }

    async fn list_pending_deletion(
        &self,
        now: DateTime<Utc>,
        grace_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError> {
        self.list_in_window(
            Condition::all()
                .add(hosting_services::Column::ExpiresAt.lte(now - Duration::days(grace_days))),
        )
        .await
    }
}

#[derive(Clone)]
pub struct DbInvoiceDirectory {
    pub db: DatabaseConnection,
}

impl InvoiceDirectory for DbInvoiceDirectory {
    async fn list_due_within(
        &self,
        now: DateTime<Utc>,
        within_days: i64,
    ) -> Result<Vec<DueInvoice>, DeliveryServiceError> {
        let rows = invoices::Entity::find()
            .find_also_related(customers::Entity)
            .filter(invoices::Column::PaidAt.is_null())
            .filter(invoices::Column::DueAt.gt(now))
            .filter(invoices::Column::DueAt.lte(now + Duration::days(within_days)))
            .order_by_asc(invoices::Column::DueAt)
            .all(&self.db)
            .await
            .context("list due invoices")?;

        let mut due = Vec::with_capacity(rows.len());
        for (invoice, customer) in rows {
            let Some(customer) = customer else {
                tracing::warn!(invoice_id = %invoice.id, "invoice has no customer");
                continue;
            };
            due.push(DueInvoice {
                id: invoice.id,
                customer_id: invoice.customer_id,
                number: invoice.number,
                amount_cents: invoice.amount_cents,
                currency: invoice.currency,
                due_at: invoice.due_at,
                contact_email: customer.email,
            });
        }
        Ok(due)
    }
}
