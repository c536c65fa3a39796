use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{
    auth::{credentials::ResetTokenError, jwt::TokenError},
    db::RepoError,
    validators::FieldErrors,
};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// Unknown login and wrong password share this variant.
    #[error("invalid login or password")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] TokenError),

    #[error("reset token rejected: {0}")]
    ResetToken(#[from] ResetTokenError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden")]
    Forbidden,

    #[error("conflict")]
    Conflict(FieldErrors),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate(field) => {
                AppError::Conflict(FieldErrors::single(field.field(), field.message()))
            }
            RepoError::Other(e) => AppError::Internal(e),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::MalformedBody(_) | AppError::ResetToken(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::InvalidCredentials | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) | AppError::Conflict(errors) => json!(errors),
            AppError::MalformedBody(reason) => json!({ "message": reason }),
            AppError::InvalidCredentials => json!({ "message": "Invalid login or password!" }),
            AppError::Unauthorized(_) => json!({ "message": "Not authorized." }),
            AppError::ResetToken(_) => json!({ "message": "Token expired, try again later." }),
            AppError::NotFound(what) => json!({ "message": format!("Error, {what} not found!") }),
            AppError::Forbidden => {
                json!({ "message": "You can only modify your own account." })
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                json!({ "message": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}
