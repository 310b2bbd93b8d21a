use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use croft_delivery::domain::repository::{
    CustomerDirectory, InvoiceDirectory, PanelClient, Sender, ServiceDirectory, SyncAccountStore,
    TaskStore,
};
use croft_delivery::domain::types::{
    CustomerProfile, DueInvoice, ExpiringService, NewTask, PanelAccount, QueueStats, SendFailure,
    SyncAccount, Task, TaskKind, TaskStatus,
};
use croft_delivery::error::DeliveryServiceError;

// ── MockTaskStore ────────────────────────────────────────────────────────────

/// In-memory task store with the same claim/ordering semantics as the
/// database implementation.
pub struct MockTaskStore {
    pub tasks: Arc<Mutex<Vec<Task>>>,
    /// When set, every enqueue fails with this message.
    pub enqueue_error: Option<String>,
}

impl MockTaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(tasks)),
            enqueue_error: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    /// Returns a shared handle to the internal task list for post-execution inspection.
    pub fn tasks_handle(&self) -> Arc<Mutex<Vec<Task>>> {
        Arc::clone(&self.tasks)
    }
}

impl TaskStore for MockTaskStore {
    async fn enqueue(&self, task: &NewTask) -> Result<bool, DeliveryServiceError> {
        if let Some(message) = &self.enqueue_error {
            return Err(DeliveryServiceError::Internal(anyhow::anyhow!(
                "{message}"
            )));
        }
        let mut tasks = self.tasks.lock().unwrap();
        if tasks
            .iter()
            .any(|t| t.idempotency_key == task.idempotency_key)
        {
            return Ok(false);
        }
        let now = Utc::now();
        tasks.push(Task {
            id: task.id,
            kind: task.kind,
            payload: task.payload.clone(),
            idempotency_key: task.idempotency_key.clone(),
            status: TaskStatus::Pending,
            scheduled_at: task.scheduled_at,
            sent_at: None,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        });
        Ok(true)
    }

    async fn list_due(
        &self,
        limit: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, DeliveryServiceError> {
        let tasks = self.tasks.lock().unwrap();
        let mut due: Vec<Task> = tasks.iter().filter(|t| t.is_due(now)).cloned().collect();
        // scheduled_at ASC nulls first, ties by id.
        due.sort_by(|a, b| match (a.scheduled_at, b.scheduled_at) {
            (None, None) => a.id.cmp(&b.id),
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y).then(a.id.cmp(&b.id)),
        });
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn try_claim(&self, id: Uuid) -> Result<bool, DeliveryServiceError> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks
            .iter_mut()
            .find(|t| t.id == id && t.status.is_claimable())
        {
            Some(task) => {
                task.status = TaskStatus::Sending;
                task.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_sent(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), DeliveryServiceError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks
            .iter_mut()
            .find(|t| t.id == id && t.status == TaskStatus::Sending)
        {
            task.status = TaskStatus::Sent;
            task.sent_at = Some(now);
            task.scheduled_at = None;
            task.updated_at = now;
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), DeliveryServiceError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks
            .iter_mut()
            .find(|t| t.id == id && t.status == TaskStatus::Sending)
        {
            task.status = TaskStatus::Failed;
            task.retry_count += 1;
            task.last_error = Some(error.to_owned());
            task.scheduled_at = Some(next_attempt_at);
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_dead(&self, id: Uuid, error: &str) -> Result<(), DeliveryServiceError> {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(task) = tasks
            .iter_mut()
            .find(|t| t.id == id && t.status == TaskStatus::Sending)
        {
            task.status = TaskStatus::Dead;
            task.retry_count += 1;
            task.last_error = Some(error.to_owned());
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Task>, DeliveryServiceError> {
        Ok(self.tasks.lock().unwrap().iter().find(|t| t.id == id).cloned())
    }

    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, DeliveryServiceError> {
        let mut tasks = self.tasks.lock().unwrap();
        let mut released = 0;
        for task in tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Sending && t.updated_at < cutoff)
        {
            task.status = TaskStatus::Pending;
            task.updated_at = Utc::now();
            released += 1;
        }
        Ok(released)
    }

    async fn stats(&self) -> Result<QueueStats, DeliveryServiceError> {
        let tasks = self.tasks.lock().unwrap();
        let count = |status| tasks.iter().filter(|t| t.status == status).count() as u64;
        Ok(QueueStats {
            pending: count(TaskStatus::Pending),
            sending: count(TaskStatus::Sending),
            sent: count(TaskStatus::Sent),
            failed: count(TaskStatus::Failed),
            dead: count(TaskStatus::Dead),
        })
    }
}

// ── MockSender ───────────────────────────────────────────────────────────────

pub struct MockSender {
    /// Error to fail with while `fail_remaining` > 0.
    pub failure: Option<SendFailure>,
    pub fail_remaining: Arc<Mutex<u32>>,
    pub delivered: Arc<Mutex<Vec<Uuid>>>,
}

impl MockSender {
    pub fn ok() -> Self {
        Self {
            failure: None,
            fail_remaining: Arc::new(Mutex::new(0)),
            delivered: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Fails every delivery.
    pub fn failing(failure: SendFailure) -> Self {
        Self {
            failure: Some(failure),
            fail_remaining: Arc::new(Mutex::new(u32::MAX)),
            delivered: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Fails the first `times` deliveries, then succeeds.
    pub fn flaky(times: u32, failure: SendFailure) -> Self {
        Self {
            failure: Some(failure),
            fail_remaining: Arc::new(Mutex::new(times)),
            delivered: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn delivered_handle(&self) -> Arc<Mutex<Vec<Uuid>>> {
        Arc::clone(&self.delivered)
    }
}

impl Sender for MockSender {
    async fn deliver(&self, task: &Task) -> Result<(), SendFailure> {
        self.delivered.lock().unwrap().push(task.id);
        let mut remaining = self.fail_remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining = remaining.saturating_sub(1);
            return Err(self.failure.clone().unwrap());
        }
        Ok(())
    }
}

// ── CRM directory mocks ──────────────────────────────────────────────────────

pub struct MockServiceDirectory {
    pub expiring: Vec<ExpiringService>,
    pub just_expired: Vec<ExpiringService>,
    pub pending_deletion: Vec<ExpiringService>,
}

impl MockServiceDirectory {
    pub fn empty() -> Self {
        Self {
            expiring: vec![],
            just_expired: vec![],
            pending_deletion: vec![],
        }
    }
}

impl ServiceDirectory for MockServiceDirectory {
    async fn list_expiring(
        &self,
        _now: DateTime<Utc>,
        _within_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError> {
        Ok(self.expiring.clone())
    }

    async fn list_just_expired(
        &self,
        _now: DateTime<Utc>,
        _lookback_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError> {
        Ok(self.just_expired.clone())
    }

    async fn list_pending_deletion(
        &self,
        _now: DateTime<Utc>,
        _grace_days: i64,
    ) -> Result<Vec<ExpiringService>, DeliveryServiceError> {
        Ok(self.pending_deletion.clone())
    }
}

pub struct MockInvoiceDirectory {
    pub due: Vec<DueInvoice>,
}

impl MockInvoiceDirectory {
    pub fn empty() -> Self {
        Self { due: vec![] }
    }
}

impl InvoiceDirectory for MockInvoiceDirectory {
    async fn list_due_within(
        &self,
        _now: DateTime<Utc>,
        _within_days: i64,
    ) -> Result<Vec<DueInvoice>, DeliveryServiceError> {
        Ok(self.due.clone())
    }
}

pub struct MockCustomerDirectory {
    pub profiles: Vec<CustomerProfile>,
}

impl CustomerDirectory for MockCustomerDirectory {
    async fn find_profile(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<CustomerProfile>, DeliveryServiceError> {
        Ok(self.profiles.iter().find(|p| p.id == customer_id).cloned())
    }
}

// ── MockPanelClient ──────────────────────────────────────────────────────────

pub struct MockPanelClient {
    pub accounts: Arc<Mutex<Vec<PanelAccount>>>,
    /// Mutating calls in order: "create" / "update:{id}".
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockPanelClient {
    pub fn new(accounts: Vec<PanelAccount>) -> Self {
        Self {
            accounts: Arc::new(Mutex::new(accounts)),
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn calls_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

impl PanelClient for MockPanelClient {
    async fn find_by_email(&self, email: &str) -> Result<Option<PanelAccount>, SendFailure> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn create_account(&self, profile: &CustomerProfile) -> Result<PanelAccount, SendFailure> {
        let account = PanelAccount {
            id: format!("pa-{}", profile.id.simple()),
            email: profile.email.clone(),
            name: profile.name.clone(),
            company: profile.company.clone(),
        };
        self.accounts.lock().unwrap().push(account.clone());
        self.calls.lock().unwrap().push("create".to_owned());
        Ok(account)
    }

    async fn update_account(
        &self,
        account_id: &str,
        profile: &CustomerProfile,
    ) -> Result<(), SendFailure> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(account) = accounts.iter_mut().find(|a| a.id == account_id) {
            account.email = profile.email.clone();
            account.name = profile.name.clone();
            account.company = profile.company.clone();
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("update:{account_id}"));
        Ok(())
    }
}

// ── MockSyncAccountStore ─────────────────────────────────────────────────────

pub struct MockSyncAccountStore {
    pub accounts: Arc<Mutex<Vec<SyncAccount>>>,
}

impl MockSyncAccountStore {
    pub fn new(accounts: Vec<SyncAccount>) -> Self {
        Self {
            accounts: Arc::new(Mutex::new(accounts)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn accounts_handle(&self) -> Arc<Mutex<Vec<SyncAccount>>> {
        Arc::clone(&self.accounts)
    }
}

impl SyncAccountStore for MockSyncAccountStore {
    async fn find_by_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Option<SyncAccount>, DeliveryServiceError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.customer_id == customer_id)
            .cloned())
    }

    async fn upsert(
        &self,
        customer_id: Uuid,
        panel_account_id: &str,
        synced_at: DateTime<Utc>,
    ) -> Result<(), DeliveryServiceError> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.iter_mut().find(|a| a.customer_id == customer_id) {
            Some(account) => {
                account.panel_account_id = panel_account_id.to_owned();
                account.last_synced_at = synced_at;
            }
            None => accounts.push(SyncAccount {
                customer_id,
                panel_account_id: panel_account_id.to_owned(),
                last_synced_at: synced_at,
            }),
        }
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn test_task(kind: TaskKind, status: TaskStatus) -> Task {
    let now = Utc::now();
    let id = Uuid::new_v4();
    Task {
        id,
        kind,
        payload: serde_json::json!({
            "to": "customer@example.com",
            "subject": "test",
            "body": "test",
        }),
        idempotency_key: format!("test:{id}"),
        status,
        scheduled_at: None,
        sent_at: None,
        retry_count: 0,
        last_error: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_profile() -> CustomerProfile {
    CustomerProfile {
        id: Uuid::new_v4(),
        email: "ada@example.com".to_owned(),
        name: "Ada Lovelace".to_owned(),
        company: Some("Analytical Engines Ltd".to_owned()),
    }
}

pub fn test_service(contact_email: &str) -> ExpiringService {
    ExpiringService {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        domain: "example.org".to_owned(),
        expires_at: Utc::now() + chrono::Duration::days(5),
        contact_email: contact_email.to_owned(),
    }
}

pub fn test_invoice(contact_email: &str) -> DueInvoice {
    DueInvoice {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        number: "INV-1042".to_owned(),
        amount_cents: 1250,
        currency: "EUR".to_owned(),
        due_at: Utc::now() + chrono::Duration::days(2),
        contact_email: contact_email.to_owned(),
    }
}
