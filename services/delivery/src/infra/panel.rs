use serde::Serialize;

use crate::domain::repository::PanelClient;
use crate::domain::types::{CustomerProfile, PanelAccount, SendFailure};
use crate::infra::failure_from_status;

/// Control-panel REST client. Pure transport — retry and convergence live in
/// the sync coordinator and the retry policy.
#[derive(Clone)]
pub struct HttpPanelClient {
    pub http: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
}

#[derive(Serialize)]
struct AccountBody<'a> {
    email: &'a str,
    name: &'a str,
    company: Option<&'a str>,
}

impl<'a> From<&'a CustomerProfile> for AccountBody<'a> {
    fn from(profile: &'a CustomerProfile) -> Self {
        Self {
            email: &profile.email,
            name: &profile.name,
            company: profile.company.as_deref(),
        }
    }
}

impl PanelClient for HttpPanelClient {
    async fn find_by_email(&self, email: &str) -> Result<Option<PanelAccount>, SendFailure> {
        let response = self
            .http
            .get(format!("{}/accounts", self.base_url))
            .query(&[("email", email)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| SendFailure::transient(format!("panel api unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure_from_status("panel api", status));
        }
        let accounts: Vec<PanelAccount> = response
            .json()
            .await
            .map_err(|e| SendFailure::transient(format!("panel api returned bad json: {e}")))?;
        Ok(accounts.into_iter().next())
    }

    async fn create_account(&self, profile: &CustomerProfile) -> Result<PanelAccount, SendFailure> {
        let response = self
            .http
            .post(format!("{}/accounts", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&AccountBody::from(profile))
            .send()
            .await
            .map_err(|e| SendFailure::transient(format!("panel api unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure_from_status("panel api", status));
        }
        response
            .json()
            .await
            .map_err(|e| SendFailure::transient(format!("panel api returned bad json: {e}")))
    }

    async fn update_account(
        &self,
        account_id: &str,
        profile: &CustomerProfile,
    ) -> Result<(), SendFailure> {
        let response = self
            .http
            .put(format!("{}/accounts/{account_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&AccountBody::from(profile))
            .send()
            .await
            .map_err(|e| SendFailure::transient(format!("panel api unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(failure_from_status("panel api", status))
        }
    }
}
