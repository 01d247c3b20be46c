// SPDX-License-Identifier: Apache-2.0
//! Error types for the contact-shield HTTP surface

use crate::db::StorageError;
use crate::limiter::Rejection;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Form validation failed")]
    Validation(Vec<String>),

    #[error("{0}")]
    BadRequest(String),

    #[error("You have submitted recently, please try again later")]
    TooFrequent,

    #[error("{}", .0.message())]
    RateLimited(Rejection),

    #[error("{0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Request timed out, please try again later")]
    Timeout,

    /// Storage failure; `detail` reaches the client only when `expose` is set
    #[error("{message}")]
    Storage {
        message: &'static str,
        detail: String,
        expose: bool,
    },
}

/// JSON body shared by every failure response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppError {
    /// Wrap a storage failure behind a generic client-facing message.
    pub fn storage(message: &'static str, err: &StorageError, expose: bool) -> Self {
        Self::Storage {
            message,
            detail: err.to_string(),
            expose,
        }
    }

    /// Message for the request log; carries storage detail regardless of mode.
    pub fn log_message(&self) -> String {
        match self {
            Self::Validation(errors) => format!("Validation failed: {}", errors.join(", ")),
            Self::Storage { message, detail, .. } => format!("{message}: {detail}"),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::TooFrequent | Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            success: false,
            message: self.to_string(),
            errors: None,
            retry_after: None,
            error: None,
        };
        match self {
            Self::Validation(errors) => body.errors = Some(errors.clone()),
            Self::RateLimited(rejection) => body.retry_after = Some(rejection.retry_after_secs()),
            Self::Storage { detail, expose, .. } => {
                body.error = expose.then(|| detail.clone());
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let Self::RateLimited(rejection) = &self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(rejection.retry_after_secs()),
            );
        }
        response
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
