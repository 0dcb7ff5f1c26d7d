use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use signalwatch_core::{ValidationErrors, VerificationError};
use thiserror::Error;

/// Field name to messages, as rendered next to form inputs.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("the given data was invalid")]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(
            errors
                .by_field()
                .into_iter()
                .map(|(field, messages)| (field.to_string(), messages))
                .collect(),
        )
    }
}

impl From<VerificationError> for ApiError {
    fn from(error: VerificationError) -> Self {
        match error {
            VerificationError::Invalid(errors) => errors.into(),
            VerificationError::NotFound { .. } => Self::NotFound(error.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({ "message": self.to_string(), "errors": errors }),
            Self::NotFound(message) => json!({ "message": message }),
            Self::Internal(message) => {
                tracing::error!(%message, "request failed");
                json!({ "message": "internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}
