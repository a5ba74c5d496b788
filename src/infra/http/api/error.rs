use std::error::Error as StdError;
use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bookshelf_api_types::{ErrorBody, ErrorMessage};

use crate::application::access::AccessDenied;
use crate::application::books::BookServiceError;
use crate::application::error::ErrorReport;
use crate::domain::error::DomainError;

pub mod codes {
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL: &str = "internal";
    pub const DEADLINE_EXCEEDED: &str = "deadline_exceeded";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn invalid_input(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::INVALID_INPUT, message, hint)
    }

    pub fn unauthenticated(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHENTICATED,
            "Caller role required",
            hint,
        )
    }

    pub fn permission_denied(hint: Option<String>) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::PERMISSION_DENIED,
            "Caller role may not call this method",
            hint,
        )
    }

    pub fn not_found(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, hint)
    }

    /// Internal failure; the cause chain goes to the log, never to the caller.
    pub fn internal(source: &'static str, error: &dyn StdError) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            status,
            code: codes::INTERNAL,
            message: "Internal server error",
            hint: None,
            report: Some(ErrorReport::from_error(source, status, error)),
        }
    }

    pub fn deadline_exceeded(limit: Duration) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            codes::DEADLINE_EXCEEDED,
            "Request deadline exceeded",
            Some(format!("deadline of {} ms elapsed", limit.as_millis())),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl From<AccessDenied> for ApiError {
    fn from(denied: AccessDenied) -> Self {
        match denied {
            AccessDenied::Unauthenticated { .. } => Self::unauthenticated(Some(denied.to_string())),
            AccessDenied::PermissionDenied { .. } => {
                Self::permission_denied(Some(denied.to_string()))
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::invalid_input("Invalid book", Some(err.to_string()))
    }
}

pub fn book_error_to_api(err: BookServiceError) -> ApiError {
    match err {
        BookServiceError::NotFound { .. } => {
            ApiError::not_found("Resource not found", Some(err.to_string()))
        }
        BookServiceError::Store(_) => ApiError::internal("infra::http::api::book_service", &err),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http::api",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ErrorBody {
            error: ErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}
