use crate::domain::repository::Sender;
use crate::domain::types::{EmailPayload, SendFailure, Task};
use crate::infra::failure_from_status;

/// Sends email tasks through the transactional mail HTTP API.
///
/// At-least-once: a timeout after the API accepted the message can deliver
/// twice on retry, which the pipeline accepts by contract.
#[derive(Clone)]
pub struct MailApiSender {
    pub http: reqwest::Client,
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

impl Sender for MailApiSender {
    async fn deliver(&self, task: &Task) -> Result<(), SendFailure> {
        let payload: EmailPayload = serde_json::from_value(task.payload.clone())
            .map_err(|e| SendFailure::permanent(format!("malformed email payload: {e}")))?;

        let response = self
            .http
            .post(format!("{}/messages", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": payload.to,
                "subject": payload.subject,
                "text": payload.body,
            }))
            .send()
            .await
            .map_err(|e| SendFailure::transient(format!("mail api unreachable: {e}")))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(failure_from_status("mail api", status))
        }
    }
}
