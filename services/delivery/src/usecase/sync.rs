use chrono::Utc;
use uuid::Uuid;

use crate::domain::repository::{CustomerDirectory, PanelClient, Sender, SyncAccountStore};
use crate::domain::types::{NewTask, PanelSyncPayload, SendFailure, SyncOutcome, Task, TaskKind};
use crate::error::DeliveryServiceError;

/// Sync coordinator: reconciles one CRM customer into the control panel.
///
/// Convergent by construction — a repeat run with unchanged input performs
/// zero external mutations (`NoChange`). The cached panel account id is the
/// stable foreign key; it is never regenerated while an association exists.
pub struct SyncCustomerUseCase<C, P, A>
where
    C: CustomerDirectory,
    P: PanelClient,
    A: SyncAccountStore,
{
    pub customers: C,
    pub panel: P,
    pub accounts: A,
}

impl<C, P, A> SyncCustomerUseCase<C, P, A>
where
    C: CustomerDirectory,
    P: PanelClient,
    A: SyncAccountStore,
{
    pub async fn execute(&self, customer_id: Uuid) -> Result<SyncOutcome, SendFailure> {
        let profile = self
            .customers
            .find_profile(customer_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| {
                // The customer row is gone; no amount of retrying brings it back.
                SendFailure::permanent(format!("customer {customer_id} not found"))
            })?;

        let existing = self.panel.find_by_email(&profile.email).await?;
        let cached = self
            .accounts
            .find_by_customer(customer_id)
            .await
            .map_err(store_failure)?;

        let (outcome, account_id) = match existing {
            Some(account) if account.matches(&profile) => (SyncOutcome::NoChange, account.id),
            Some(account) => {
                self.panel.update_account(&account.id, &profile).await?;
                (SyncOutcome::Updated, account.id)
            }
            None => match cached {
                // The local email changed, so the natural-key lookup misses
                // while the panel account still exists under the old address.
                // Update through the cached id instead of creating a duplicate.
                Some(sync) => {
                    self.panel
                        .update_account(&sync.panel_account_id, &profile)
                        .await?;
                    (SyncOutcome::Updated, sync.panel_account_id)
                }
                None => {
                    let created = self.panel.create_account(&profile).await?;
                    (SyncOutcome::Created, created.id)
                }
            },
        };

        self.accounts
            .upsert(customer_id, &account_id, Utc::now())
            .await
            .map_err(store_failure)?;

        tracing::info!(
            customer_id = %customer_id,
            panel_account_id = %account_id,
            outcome = outcome.as_str(),
            "customer sync finished"
        );
        Ok(outcome)
    }
}

/// Adapts the sync coordinator to the sender seam so `panel_sync` tasks ride
/// the same claim/retry pipeline as outbound mail.
pub struct PanelSyncSender<C, P, A>
where
    C: CustomerDirectory,
    P: PanelClient,
    A: SyncAccountStore,
{
    pub sync: SyncCustomerUseCase<C, P, A>,
}

impl<C, P, A> Sender for PanelSyncSender<C, P, A>
where
    C: CustomerDirectory,
    P: PanelClient,
    A: SyncAccountStore,
{
    async fn deliver(&self, task: &Task) -> Result<(), SendFailure> {
        let payload: PanelSyncPayload = serde_json::from_value(task.payload.clone())
            .map_err(|e| SendFailure::permanent(format!("malformed panel_sync payload: {e}")))?;
        self.sync.execute(payload.customer_id).await?;
        Ok(())
    }
}

/// Local store errors are retry-worthy; the data may be back next attempt.
fn store_failure(e: DeliveryServiceError) -> SendFailure {
    SendFailure::transient(e.to_string())
}

/// Build the `panel_sync` task for a customer. Syncs triggered from other
/// flows are enqueued rather than fired untracked, so failures stay
/// retryable and visible. The minute bucket in the idempotency key collapses
/// rapid duplicate triggers while still allowing a fresh sync later.
pub fn sync_task(customer_id: Uuid, now: chrono::DateTime<Utc>) -> NewTask {
    NewTask {
        id: Uuid::new_v4(),
        kind: TaskKind::PanelSync,
        payload: serde_json::json!({ "customer_id": customer_id }),
        idempotency_key: format!("panel_sync:{customer_id}:{}", now.format("%Y-%m-%dT%H:%M")),
        scheduled_at: None,
    }
}
