use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::database::is_unique_violation;
use crate::transfers::TransferError;

/// Error returned by every API handler, rendered as
/// `{"error": "<KIND>", "message": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthenticated", message)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal",
            "an unexpected error occurred",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.kind,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<TransferError> for ApiError {
    fn from(err: TransferError) -> Self {
        let message = err.to_string();
        match err {
            TransferError::InvalidTransferRequest(_) => {
                Self::new(StatusCode::BAD_REQUEST, "InvalidTransferRequest", message)
            }
            TransferError::QuantityOutOfRange { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "QuantityOutOfRange", message)
            }
            TransferError::AllocationMismatch { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "AllocationMismatch", message)
            }
            TransferError::PermissionDenied(_) => {
                Self::new(StatusCode::FORBIDDEN, "PermissionDenied", message)
            }
            TransferError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "NotFound", message),
            TransferError::InvalidTransition { .. } => {
                Self::new(StatusCode::CONFLICT, "InvalidTransition", message)
            }
            TransferError::InsufficientBatchStock { .. } => {
                Self::new(StatusCode::CONFLICT, "InsufficientBatchStock", message)
            }
            TransferError::Database(db_err) => db_err.into(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return Self::new(
                StatusCode::CONFLICT,
                "Conflict",
                "a record with this key already exists",
            );
        }
        log::error!("database error: {err}");
        Self::internal()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "InvalidRequestBody", rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn workflow_errors_map_to_status_codes() {
        let cases = [
            (TransferError::InvalidTransferRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                TransferError::QuantityOutOfRange { field: "approved_quantity", value: 0, max: 5 },
                StatusCode::BAD_REQUEST,
            ),
            (
                TransferError::AllocationMismatch { allocated: 3, prepared: 4 },
                StatusCode::BAD_REQUEST,
            ),
            (TransferError::PermissionDenied("no".into()), StatusCode::FORBIDDEN),
            (TransferError::NotFound("transfer"), StatusCode::NOT_FOUND),
            (
                TransferError::InvalidTransition { action: "approve", from: "DELIVERED" },
                StatusCode::CONFLICT,
            ),
            (
                TransferError::InsufficientBatchStock {
                    batch_id: Some(Uuid::nil()),
                    requested: 5,
                    available: 2,
                },
                StatusCode::CONFLICT,
            ),
            (TransferError::Database(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, "Internal");
        assert!(!err.message.contains("pool"));
    }
}
