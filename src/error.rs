//! Errors surfaced by the CRM service and their HTTP rendering.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::store::StoreError;

/// Errors from CRM operations.
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("Provider not found")]
    NotFound(String),
    #[error("Provider ID already exists")]
    Conflict(String),
    #[error("No endpoint URL configured for this provider")]
    MissingEndpoint(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CrmError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CrmError::NotFound(_) => StatusCode::NOT_FOUND,
            CrmError::Conflict(_) => StatusCode::CONFLICT,
            CrmError::MissingEndpoint(_) | CrmError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CrmError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<JsonRejection> for CrmError {
    fn from(rejection: JsonRejection) -> Self {
        CrmError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for CrmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            CrmError::Store(e) => {
                tracing::error!(error = %e, "Storage failure");
                ErrorResponse {
                    error: "Internal server error".to_string(),
                    message: Some(e.to_string()),
                }
            }
            CrmError::BadRequest(detail) => {
                tracing::debug!(%detail, "Request rejected");
                ErrorResponse {
                    error: "Invalid request".to_string(),
                    message: Some(detail.clone()),
                }
            }
            CrmError::NotFound(provider_id)
            | CrmError::Conflict(provider_id)
            | CrmError::MissingEndpoint(provider_id) => {
                tracing::debug!(%provider_id, status = status.as_u16(), error = %self, "Request rejected");
                ErrorResponse {
                    error: self.to_string(),
                    message: None,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(error: CrmError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let (status, body) = render(CrmError::NotFound("alpha".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "Provider not found"}));
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let (status, body) = render(CrmError::BadRequest("unknown variant `paused`".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({"error": "Invalid request", "message": "unknown variant `paused`"})
        );
    }

    #[tokio::test]
    async fn test_store_error_response() {
        let (status, body) =
            render(CrmError::Store(StoreError::Backend("disk full".into()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["message"], "Storage backend failure: disk full");
    }
}
