// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! API error type shared by every route handler.

use crate::models::common::MessageResponse;
use crate::services::booking_db::BookingError;
use crate::services::cart_db::CheckoutError;
use crate::services::configurator::ConfiguratorError;
use crate::services::storage::StorageError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Too many requests, retry after {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Internal server error")]
    Database(sqlx::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Translate store errors into client-facing categories.
///
/// Constraint violations are the client's fault; anything else stays opaque.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("A record with the same unique value already exists".into())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                ApiError::BadRequest("Referenced record does not exist".into())
            }
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                ApiError::BadRequest("Value violates a table constraint".into())
            }
            _ => ApiError::Database(err),
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart | CheckoutError::TotalTooLarge => {
                ApiError::BadRequest(err.to_string())
            }
            CheckoutError::Unavailable(_) | CheckoutError::InsufficientStock { .. } => {
                ApiError::Conflict(err.to_string())
            }
            CheckoutError::Database(e) => e.into(),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::SlotTaken => ApiError::Conflict(err.to_string()),
            BookingError::Database(e) => e.into(),
        }
    }
}

impl From<ConfiguratorError> for ApiError {
    fn from(err: ConfiguratorError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedType | StorageError::InvalidName => {
                ApiError::BadRequest(err.to_string())
            }
            StorageError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            StorageError::NotFound => ApiError::not_found("File"),
            StorageError::Io(e) => {
                ApiError::Internal(anyhow::Error::new(e).context("Upload storage failed"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Internal(e) => tracing::error!(error = ?e, "Request failed"),
            ApiError::Database(e) => tracing::error!(error = %e, "Database error"),
            ApiError::BadGateway(msg) => tracing::warn!(%msg, "Upstream failure"),
            _ => {}
        }

        let body = Json(MessageResponse {
            success: false,
            message: self.to_string(),
        });

        let mut response = (status, body).into_response();
        if let ApiError::TooManyRequests { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::bad_request("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::forbidden("x").into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::not_found("Product").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_row_not_found_maps_to_404() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = ApiError::Internal(anyhow::anyhow!("secret connection string"));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let empty: ApiError = CheckoutError::EmptyCart.into();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let short: ApiError = CheckoutError::InsufficientStock {
            name: "Bagel".to_string(),
        }
        .into();
        assert_eq!(short.status(), StatusCode::CONFLICT);

        let taken: ApiError = BookingError::SlotTaken.into();
        assert_eq!(taken.status(), StatusCode::CONFLICT);

        let big: ApiError = StorageError::TooLarge { max_bytes: 10 }.into();
        assert_eq!(big.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let unknown: ApiError = ConfiguratorError::UnknownModule("seo".to_string()).into();
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unknown.to_string(), "Unknown module 'seo'");
    }

    #[test]
    fn test_too_many_requests_sets_retry_after() {
        let response = ApiError::TooManyRequests {
            retry_after_secs: 42,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }
}
