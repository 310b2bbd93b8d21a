use sea_orm::DatabaseConnection;

use crate::domain::types::RetryPolicy;
use crate::infra::db::{
    DbCustomerDirectory, DbInvoiceDirectory, DbServiceDirectory, DbSyncAccountStore, DbTaskStore,
};
use crate::infra::mail::MailApiSender;
use crate::infra::panel::HttpPanelClient;
use crate::usecase::dispatch::KindSender;
use crate::usecase::sync::{PanelSyncSender, SyncCustomerUseCase};

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub http: reqwest::Client,
    pub cron_token: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    pub panel_base_url: String,
    pub panel_api_key: String,
    pub retry_policy: RetryPolicy,
    pub stale_sending_secs: i64,
}

impl AppState {
    pub fn task_store(&self) -> DbTaskStore {
        DbTaskStore {
            db: self.db.clone(),
        }
    }

    pub fn sync_account_store(&self) -> DbSyncAccountStore {
        DbSyncAccountStore {
            db: self.db.clone(),
        }
    }

    pub fn customer_directory(&self) -> DbCustomerDirectory {
        DbCustomerDirectory {
            db: self.db.clone(),
        }
    }

    pub fn service_directory(&self) -> DbServiceDirectory {
        DbServiceDirectory {
            db: self.db.clone(),
        }
    }

    pub fn invoice_directory(&self) -> DbInvoiceDirectory {
        DbInvoiceDirectory {
            db: self.db.clone(),
        }
    }

    pub fn mail_sender(&self) -> MailApiSender {
        MailApiSender {
            http: self.http.clone(),
            api_url: self.mail_api_url.clone(),
            api_key: self.mail_api_key.clone(),
            from: self.mail_from.clone(),
        }
    }

    pub fn panel_client(&self) -> HttpPanelClient {
        HttpPanelClient {
            http: self.http.clone(),
            base_url: self.panel_base_url.clone(),
            api_key: self.panel_api_key.clone(),
        }
    }

    /// The full sender stack: mail kinds go to the mail API, `panel_sync`
    /// rides through the sync coordinator.
    pub fn sender(
        &self,
    ) -> KindSender<
        MailApiSender,
        PanelSyncSender<DbCustomerDirectory, HttpPanelClient, DbSyncAccountStore>,
    > {
        KindSender {
            mail: self.mail_sender(),
            panel_sync: PanelSyncSender {
                sync: SyncCustomerUseCase {
                    customers: self.customer_directory(),
                    panel: self.panel_client(),
                    accounts: self.sync_account_store(),
                },
            },
        }
    }
}
