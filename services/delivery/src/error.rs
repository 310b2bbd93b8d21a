use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Delivery service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryServiceError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("task not found")]
    TaskNotFound,
    #[error("task is not claimable")]
    TaskNotClaimable,
    #[error("customer not found")]
    CustomerNotFound,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl DeliveryServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::TaskNotFound => "TASK_NOT_FOUND",
            Self::TaskNotClaimable => "TASK_NOT_CLAIMABLE",
            Self::CustomerNotFound => "CUSTOMER_NOT_FOUND",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for DeliveryServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::TaskNotFound | Self::CustomerNotFound => StatusCode::NOT_FOUND,
            Self::TaskNotClaimable => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Log 500s only — tower-http TraceLayer already records method/uri/status for all
        // requests. 4xx are expected client errors; logging them here would be noise.
        // Internal errors need the anyhow chain logged so the root cause is traceable.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = %e, kind = "INTERNAL", "internal error");
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
