use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use helpdesk_db::StoreError;
use helpdesk_types::api::ErrorResponse;

/// Error returned by every handler: a status code plus a message safe to
/// show to the caller.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "not allowed for this role")
    }

    /// Logs the cause; the caller only sees a generic message.
    pub fn internal(cause: impl fmt::Display) -> Self {
        error!("Internal error: {}", cause);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::DuplicateUsername(_) | StoreError::DuplicateQuery { .. } => {
                StatusCode::CONFLICT
            }
            StoreError::AlreadyClosed(_) => StatusCode::CONFLICT,
            StoreError::InvalidRole(_) | StoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            StoreError::AuthFailure => StatusCode::UNAUTHORIZED,
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::StorageUnavailable(cause) => {
                error!("Storage unavailable: {}", cause);
                return Self::new(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable");
            }
        };

        if status != StatusCode::UNAUTHORIZED {
            warn!("Request rejected: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpdesk_types::models::QueryId;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (StoreError::DuplicateUsername("a".into()), StatusCode::CONFLICT),
            (StoreError::InvalidRole("Admin".into()), StatusCode::BAD_REQUEST),
            (StoreError::AuthFailure, StatusCode::UNAUTHORIZED),
            (StoreError::DuplicateQuery { mail_id: "a@x.com".into() }, StatusCode::CONFLICT),
            (StoreError::NotFound(QueryId::from_row(1)), StatusCode::NOT_FOUND),
            (StoreError::AlreadyClosed(QueryId::from_row(1)), StatusCode::CONFLICT),
            (StoreError::InvalidInput("x"), StatusCode::BAD_REQUEST),
            (StoreError::StorageUnavailable("disk I/O error".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn storage_details_are_not_exposed() {
        let err = ApiError::from(StoreError::StorageUnavailable("database is locked".into()));
        assert_eq!(err.message, "storage unavailable");
    }
}
