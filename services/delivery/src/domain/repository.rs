#![allow(async_fn_in_trait)]

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{
    CustomerProfile, DueInvoice, ExpiringService, NewTask, PanelAccount, QueueStats, SendFailure,
    SyncAccount, Task,
};
use crate::error::DeliveryServiceError;

/// Task record store: the single source of truth for the delivery pipeline.
///
/// All coordination goes through conditional updates here — implementations
/// must make `try_claim`, `mark_sent` and `release_stale` atomic
/// compare-and-set operations, never read-then-write.
pub trait TaskStore: Send + Sync {
    /// Insert a new pending task. Returns `false` (and inserts nothing) when a
    /// task with the same idempotency key already exists.
    async fn enqueue(&self, task: &NewTask) -> Result<bool, DeliveryServiceError>;

    /// Up to `limit` claimable tasks due at `now`, oldest-due first
    /// (`scheduled_at` ASC, nulls first, ties by id ASC).
    async fn list_due(
        &self,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, DeliveryServiceError>;

    /// Atomically transition a claimable task to `sending`. Returns `false`
    /// when the task was already claimed or is no longer claimable.
    async fn try_claim(&self, id: Uuid) -> Result<bool, DeliveryServiceError>;

    /// Transition a `sending` task to `sent`, set `sent_at` and clear
    /// `scheduled_at` (first success only — a task already sent is left
    /// untouched).
    async fn mark_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DeliveryServiceError>;

    /// Record a retryable failure: status `failed`, `retry_count + 1`,
    /// `last_error` overwritten, next eligibility at `next_attempt_at`.
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), DeliveryServiceError>;

    /// Dead-letter a task: terminal, excluded from all future claims.
    async fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), DeliveryServiceError>;

    async fn find(&self, id: Uuid) -> Result<Option<Task>, DeliveryServiceError>;

    /// Return `sending` tasks untouched since `cutoff` to `pending` (crashed
    /// worker recovery). Returns the number of tasks reclaimed.
    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DeliveryServiceError>;

    /// Counts grouped by status.
    async fn stats(&self) -> Result<QueueStats, DeliveryServiceError>;
}

/// Cache of customer ↔ control-panel account associations.
pub trait SyncAccountStore: Send + Sync {
    async fn find_by_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<SyncAccount>, DeliveryServiceError>;

    /// Insert or refresh the association after a successful sync.
    async fn upsert(
        &self,
        customer_id: Uuid,
        panel_account_id: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<(), DeliveryServiceError>;
}

/// Read access to CRM customer profiles.
pub trait CustomerDirectory: Send + Sync {
    async fn find_profile(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<CustomerProfile>, DeliveryServiceError>;
}

/// Read access to CRM hosting services for expiry scheduling.
/// All listings exclude services already torn down (`deleted_at` set).
pub trait ServiceDirectory: Send + Sync {
    /// Services expiring in `(now, now + within_days]`.
    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        within_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError>;

    /// Services that expired in `(now - lookback_days, now]`.
    async fn list_just_expired(
        &self,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError>;

    /// Services expired longer than `grace_days` ago and awaiting deletion.
    async fn list_pending_deletion(
        &self,
        now: DateTime<Utc>,
        grace_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError>;
}

/// Read access to CRM invoices for reminder scheduling.
pub trait InvoiceDirectory: Send + Sync {
    /// Unpaid invoices due in `(now, now + within_days]`.
    async fn list_due_within(
        &self,
        now: DateTime<Utc>,
        within_days: i64,
    ) -> Result<Vec<DueInvoice>, DeliveryServiceError>;
}

/// Control-panel API client. No retry logic lives here — failures are
/// classified (`SendFailure::permanent`) and surfaced to the retry policy.
pub trait PanelClient: Send + Sync {
    /// Look up an account by its natural key.
    async fn find_by_email(&self, email: &str) -> Result<Option<PanelAccount>, SendFailure>;

    async fn create_account(&self, profile: &CustomerProfile) -> Result<PanelAccount, SendFailure>;

    async fn update_account(
        &self,
        account_id: &str,
        profile: &CustomerProfile,
    ) -> Result<(), SendFailure>;
}

/// Sender capability: performs the actual side effect for one task.
///
/// Implementations must be idempotency-tolerant — the pipeline guarantees
/// at-least-once delivery, not exactly-once.
pub trait Sender: Send + Sync {
    async fn deliver(&self, task: &Task) -> Result<(), SendFailure>;
}
