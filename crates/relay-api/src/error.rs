//! Map core errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use relay_core::RelayError;
use relay_types::api::ErrorBody;

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] RelayError);

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(RelayError::Store(e))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::PermissionDenied => StatusCode::FORBIDDEN,
            RelayError::InvalidSessionState
            | RelayError::AlreadyGranted(_)
            | RelayError::NotGranted(_) => StatusCode::CONFLICT,
            RelayError::EmptySelection | RelayError::EmptyText | RelayError::NoRecipients => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RelayError::UnknownSender(_) | RelayError::UnknownUser(_) => StatusCode::NOT_FOUND,
            RelayError::InvalidSubject => StatusCode::BAD_REQUEST,
            RelayError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            RelayError::Store(e) => {
                error!("Storage failure: {:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            code: self.0.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
