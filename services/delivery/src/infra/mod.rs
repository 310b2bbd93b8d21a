pub mod db;
pub mod mail;
pub mod panel;

use reqwest::StatusCode;

use crate::domain::types::SendFailure;

/// Classify an upstream HTTP status into a send outcome. 4xx means the request
/// itself is bad and will never succeed, except 408/429 which are load
/// signals; everything else (5xx, odd codes) is worth retrying.
pub(crate) fn failure_from_status(upstream: &str, status: StatusCode) -> SendFailure {
    let message = format!("{upstream} returned {status}");
    if status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
    {
        SendFailure::permanent(message)
    } else {
        SendFailure::transient(message)
    }
}
