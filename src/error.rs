use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

use crate::data::ModelError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(String),

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("validation failed")]
    FailedValidation(BTreeMap<String, String>),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("unable to resolve client identity: {0}")]
    IdentityResolution(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

const SERVER_ERROR_MESSAGE: &str = "the server encountered a problem and could not process your request";

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::EditConflict => StatusCode::CONFLICT,
            AppError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::IdentityResolution(_) | AppError::Internal(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> Value {
        match self {
            AppError::FailedValidation(errors) => json!(errors),
            AppError::IdentityResolution(_) | AppError::Internal(_) | AppError::Database(_) => {
                json!(SERVER_ERROR_MESSAGE)
            }
            other => json!(other.to_string()),
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::RecordNotFound => AppError::NotFound,
            ModelError::EditConflict => AppError::EditConflict,
            ModelError::Database(err) => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
