use chrono::{DateTime, Duration, Utc};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Task kinds ───────────────────────────────────────────────────────────────

/// Kind of side effect a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    NotificationEmail,
    InvoiceReminder,
    PanelSync,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotificationEmail => "notification_email",
            Self::InvoiceReminder => "invoice_reminder",
            Self::PanelSync => "panel_sync",
        }
    }

    /// Parse from the stored string value. Returns `None` for unknown kinds.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "notification_email" => Some(Self::NotificationEmail),
            "invoice_reminder" => Some(Self::InvoiceReminder),
            "panel_sync" => Some(Self::PanelSync),
            _ => None,
        }
    }
}

// ── Task status ──────────────────────────────────────────────────────────────

/// Task state machine.
///
/// Transitions:
/// - `Pending -> Sending -> Sent`
/// - `Pending -> Sending -> Failed -> Sending -> …` (until the retry ceiling)
/// - `… -> Dead` (ceiling reached, or sender flagged the failure permanent)
///
/// `Sending` is the transient in-flight lock; a crashed worker leaves tasks
/// here until the staleness sweep returns them to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Sending,
    Sent,
    Failed,
    Dead,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Dead => "dead",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "sending" => Some(Self::Sending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions (except `updated_at`).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Dead)
    }

    /// May a dispatcher claim a task in this state?
    pub fn is_claimable(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

// ── Task ─────────────────────────────────────────────────────────────────────

/// A persisted unit of deferred, retryable work.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub status: TaskStatus,
    /// Earliest eligible execution time; `None` = eligible immediately.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable() && self.scheduled_at.is_none_or(|at| at <= now)
    }
}

/// Insert payload for a new task. Status starts at `Pending`.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub id: Uuid,
    pub kind: TaskKind,
    pub payload: serde_json::Value,
    /// `(entity, kind, period)` encoding; unique in the store, so re-running
    /// the scheduler for the same period inserts nothing.
    pub idempotency_key: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

// ── Payloads ─────────────────────────────────────────────────────────────────

/// Payload for `notification_email` and `invoice_reminder` tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Payload for `panel_sync` tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSyncPayload {
    pub customer_id: Uuid,
}

// ── Send failures ────────────────────────────────────────────────────────────

/// Failure reported by a sender.
///
/// `permanent = true` tells the retry policy not to bother: the remote rejected
/// the payload irrecoverably and the task goes straight to the dead letter.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct SendFailure {
    pub message: String,
    pub permanent: bool,
}

impl SendFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: true,
        }
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────────

/// Pure retry decision logic: per-kind attempt ceilings plus exponential
/// backoff for the next eligibility time.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Ceiling for the email kinds.
    pub email_max_attempts: u32,
    /// Ceiling for `panel_sync` — higher, external panels have longer outages.
    pub sync_max_attempts: u32,
    /// Base delay before the first retry, in seconds.
    pub base_delay_secs: i64,
    /// Exponential backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            email_max_attempts: DEFAULT_EMAIL_MAX_ATTEMPTS,
            sync_max_attempts: DEFAULT_SYNC_MAX_ATTEMPTS,
            base_delay_secs: DEFAULT_RETRY_BASE_SECS,
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts_for(&self, kind: TaskKind) -> u32 {
        match kind {
            TaskKind::NotificationEmail | TaskKind::InvoiceReminder => self.email_max_attempts,
            TaskKind::PanelSync => self.sync_max_attempts,
        }
    }

    /// Does a task with `retry_count` failed attempts remain claimable?
    pub fn should_retry(&self, kind: TaskKind, retry_count: u32) -> bool {
        retry_count < self.max_attempts_for(kind)
    }

    /// Delay before the next attempt after `retry_count` failures (1-indexed).
    ///
    /// Exponential with ±20% jitter so a batch of failures does not come back
    /// as a synchronized thundering herd.
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        let exp = retry_count.saturating_sub(1).min(16);
        let base = self.base_delay_secs as f64 * self.multiplier.powi(exp as i32);
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(0.8..1.2);
        Duration::seconds((base * jitter) as i64)
    }
}

// ── Sync coordinator types ───────────────────────────────────────────────────

/// Result of one idempotent sync attempt against the control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Created,
    Updated,
    NoChange,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::NoChange => "no_change",
        }
    }
}

/// Local customer fields mirrored to the control panel.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub company: Option<String>,
}

/// Remote control-panel account as returned by the panel API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PanelAccount {
    pub id: String,
    pub email: String,
    pub name: String,
    pub company: Option<String>,
}

impl PanelAccount {
    /// Field-level equality with the local profile; `true` means no mutating
    /// call is needed.
    pub fn matches(&self, profile: &CustomerProfile) -> bool {
        self.email == profile.email
            && self.name == profile.name
            && self.company == profile.company
    }
}

/// Cached customer ↔ panel-account association.
#[derive(Debug, Clone)]
pub struct SyncAccount {
    pub customer_id: Uuid,
    pub panel_account_id: String,
    pub last_synced_at: DateTime<Utc>,
}

// ── Scheduler inputs ─────────────────────────────────────────────────────────

/// Hosting service row relevant to expiry scheduling, joined with the
/// customer's contact email.
#[derive(Debug, Clone)]
pub struct ExpiringService {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub domain: String,
    pub expires_at: DateTime<Utc>,
    pub contact_email: String,
}

/// Unpaid invoice approaching its due date.
#[derive(Debug, Clone)]
pub struct DueInvoice {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub number: String,
    pub amount_cents: i64,
    pub currency: String,
    pub due_at: DateTime<Utc>,
    pub contact_email: String,
}

// ── Reports ──────────────────────────────────────────────────────────────────

/// Scheduler run summary: tasks newly materialized, partitioned by rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleReport {
    pub expiring: u64,
    pub expired: u64,
    pub deletion_warning: u64,
    pub invoice_reminders: u64,
    /// Entities that could not be evaluated; logged, never fatal to the run.
    pub skipped: u64,
}

impl ScheduleReport {
    pub fn total_scheduled(&self) -> u64 {
        self.expiring + self.expired + self.deletion_warning + self.invoice_reminders
    }
}

/// Dispatch batch summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Tasks delivered and marked sent.
    pub processed: u64,
    /// Tasks whose sender call failed (retried or dead-lettered).
    pub failed: u64,
    /// Tasks another dispatcher claimed first; not an error.
    pub skipped: u64,
}

/// Task counts grouped by status, for operational dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub sending: u64,
    pub sent: u64,
    pub failed: u64,
    pub dead: u64,
}

// ── Constants ────────────────────────────────────────────────────────────────

/// Batch size when the caller does not pass `limit`.
pub const DEFAULT_BATCH_LIMIT: u64 = 25;

/// Hard cap on `limit` to bound per-invocation external-call volume.
pub const MAX_BATCH_LIMIT: u64 = 50;

/// Days before `expires_at` at which the expiring notice is scheduled.
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// Lookback window for the expired notice.
pub const EXPIRED_LOOKBACK_DAYS: i64 = 3;

/// Days after expiry before the account is torn down; the deletion warning
/// goes out when this grace window runs out.
pub const DELETION_GRACE_DAYS: i64 = 30;

/// Days before an invoice's due date at which the reminder is scheduled.
pub const INVOICE_DUE_SOON_DAYS: i64 = 3;

/// Default retry ceiling for email kinds.
pub const DEFAULT_EMAIL_MAX_ATTEMPTS: u32 = 4;

/// Default retry ceiling for panel sync.
pub const DEFAULT_SYNC_MAX_ATTEMPTS: u32 = 6;

/// Default base backoff delay in seconds.
pub const DEFAULT_RETRY_BASE_SECS: i64 = 60;

/// A task stuck in `sending` longer than this is presumed orphaned by a
/// crashed worker and returned to `pending` by the staleness sweep.
pub const STALE_SENDING_SECS: i64 = 600;
