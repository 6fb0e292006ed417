//! Unified application error model and mapping helpers.
//! Errors raised by the identity picker are mapped here into a single enum that the
//! HTTP frontend renders as a JSON body with a matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::identity::PickerError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, message: String, field: String },
    NotFound { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    /// Name of the offending request field, for validation failures only.
    pub fn field(&self) -> Option<&str> {
        match self {
            AppError::Validation { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }

    pub fn validation<S: Into<String>>(field: S, msg: S) -> Self {
        AppError::Validation { code: "invalid_input".into(), message: msg.into(), field: field.into() }
    }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.field() {
            Some(field) => write!(f, "{}: {} (field '{}')", self.code_str(), self.message(), field),
            None => write!(f, "{}: {}", self.code_str(), self.message()),
        }
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<PickerError> for AppError {
    fn from(err: PickerError) -> Self {
        match err {
            PickerError::Validation { field, message } => AppError::Validation { code: "invalid_input".into(), message, field },
            // Broken or expired transaction: not something the user can fix by resubmitting
            PickerError::FlowIntegrity(message) => AppError::Internal { code: "flow_integrity".into(), message },
            PickerError::Shape(message) => AppError::Internal { code: "invalid_shape".into(), message },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::validation("identity-index", "oops").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn picker_errors_map_to_frontend_errors() {
        let err: AppError = PickerError::validation("identity-index", "No matching identity selected").into();
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.code_str(), "invalid_input");
        assert_eq!(err.field(), Some("identity-index"));

        let err: AppError = PickerError::FlowIntegrity("Did not find model in session".into()).into();
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code_str(), "flow_integrity");
        assert_eq!(err.field(), None);

        let err: AppError = PickerError::Shape("Identity was not a map".into()).into();
        assert_eq!(err.code_str(), "invalid_shape");
    }

    #[test]
    fn anyhow_errors_are_internal() {
        let err: AppError = anyhow::anyhow!("entropy source unavailable").into();
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code_str(), "internal_error");
        assert_eq!(err.message(), "entropy source unavailable");
    }

    #[test]
    fn serializes_with_type_tag() {
        let body = serde_json::to_value(AppError::validation("identity-index", "error.no.selected.identity")).unwrap();
        assert_eq!(body["type"], "validation");
        assert_eq!(body["field"], "identity-index");
        assert_eq!(body["message"], "error.no.selected.identity");
    }

    #[test]
    fn into_response_uses_http_status() {
        let resp = AppError::not_found("unknown_transaction", "gone").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = AppError::validation("identity-index", "blank").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
