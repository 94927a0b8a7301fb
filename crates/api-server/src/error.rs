//! Error types for the HTTP API.

use auth::AuthError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use database::{DatabaseError, ValidationError};
use thiserror::Error;

use crate::response::{Envelope, FieldError};

/// Generic message for every request validation failure.
pub const INVALID_REQUEST: &str = "请求参数错误";

/// Errors that can occur while handling a request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A 4xx answer with a user-facing message.
    #[error("{message}")]
    Client {
        status: StatusCode,
        message: String,
        field: String,
        detail: String,
    },

    /// Too many requests from one client.
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Token or credential error.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn client(status: StatusCode, message: &str, field: &str, detail: impl Into<String>) -> Self {
        ApiError::Client {
            status,
            message: message.to_string(),
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    pub fn bad_request(message: &str, field: &str, detail: impl Into<String>) -> Self {
        Self::client(StatusCode::BAD_REQUEST, message, field, detail)
    }

    /// 400 with the generic validation message.
    pub fn invalid(field: &str, detail: impl Into<String>) -> Self {
        Self::bad_request(INVALID_REQUEST, field, detail)
    }

    pub fn unauthorized(message: &str, field: &str, detail: impl Into<String>) -> Self {
        Self::client(StatusCode::UNAUTHORIZED, message, field, detail)
    }

    pub fn forbidden(message: &str, field: &str, detail: impl Into<String>) -> Self {
        Self::client(StatusCode::FORBIDDEN, message, field, detail)
    }

    pub fn not_found(message: &str, field: &str, detail: impl Into<String>) -> Self {
        Self::client(StatusCode::NOT_FOUND, message, field, detail)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Client { status, .. } => *status,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Database(DatabaseError::AlreadyExists { .. }) => StatusCode::CONFLICT,
            ApiError::Database(DatabaseError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Auth(err) if err.is_rejection() => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::invalid(err.field(), err.to_string())
    }
}

fn internal() -> (String, FieldError) {
    (
        "服务器内部错误".to_string(),
        FieldError {
            field: "server".to_string(),
            message: "服务器处理请求时发生错误，请稍后重试".to_string(),
        },
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, error) = match &self {
            ApiError::Client {
                message,
                field,
                detail,
                ..
            } => {
                tracing::info!(status = status.as_u16(), field = %field, "Rejected request: {}", detail);
                (
                    message.clone(),
                    FieldError {
                        field: field.clone(),
                        message: detail.clone(),
                    },
                )
            }
            ApiError::RateLimited { .. } => {
                tracing::warn!("Rate limit exceeded");
                (
                    "请求过于频繁，请稍后再试".to_string(),
                    FieldError {
                        field: "rate_limit".to_string(),
                        message: "请求次数超过限制".to_string(),
                    },
                )
            }
            ApiError::Database(DatabaseError::NotFound { entity, id }) => {
                tracing::info!(entity, id = %id, "Resource not found");
                (
                    "资源不存在".to_string(),
                    FieldError {
                        field: "resource".to_string(),
                        message: format!("{}不存在", entity),
                    },
                )
            }
            ApiError::Database(DatabaseError::AlreadyExists { entity, .. }) => (
                "资源已存在".to_string(),
                FieldError {
                    field: "resource".to_string(),
                    message: format!("{}已存在", entity),
                },
            ),
            ApiError::Database(DatabaseError::Validation(err)) => (
                INVALID_REQUEST.to_string(),
                FieldError {
                    field: err.field().to_string(),
                    message: err.to_string(),
                },
            ),
            ApiError::Auth(err) if err.is_rejection() => {
                tracing::info!(error = %err, "Rejected credential");
                (
                    "访问令牌无效".to_string(),
                    FieldError {
                        field: "token".to_string(),
                        message: "访问令牌无效或已过期".to_string(),
                    },
                )
            }
            ApiError::Database(err) => {
                tracing::error!("Database error: {}", err);
                internal()
            }
            ApiError::Auth(err) => {
                tracing::error!("Auth error: {}", err);
                internal()
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal()
            }
        };

        let body = Envelope::<()>::new(status, message, None, Some(error));
        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type for handlers.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::invalid("phone", "x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Database(DatabaseError::NotFound {
                entity: "User",
                id: "1".into()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Database(DatabaseError::AlreadyExists {
                entity: "User",
                id: "1".into()
            })
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::Auth(AuthError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Auth(AuthError::Signing("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::RateLimited { retry_after_secs: 1 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_validation_error_keeps_field() {
        let err: ApiError = ValidationError::InvalidPhone.into();
        match err {
            ApiError::Client { field, message, detail, .. } => {
                assert_eq!(field, "phone");
                assert_eq!(message, INVALID_REQUEST);
                assert_eq!(detail, "手机号格式不正确");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
