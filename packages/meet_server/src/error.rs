use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use meet_model::{ErrorBody, MeetError};

use crate::service::ServiceError;

/// Error returned by the JSON API. Renders as `{ "error": code, "message": text }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("{message}")]
    Status {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn status(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code,
            message: message.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Service(ServiceError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Service(ServiceError::Meet(e)) => meet_status(e),
        }
    }
}

impl From<MeetError> for ApiError {
    fn from(e: MeetError) -> Self {
        Self::Service(e.into())
    }
}

pub fn meet_status(e: &MeetError) -> StatusCode {
    match e {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        MeetError::InvalidJudgePin => StatusCode::FORBIDDEN,
        MeetError::AlreadyAssigned { .. }
        | MeetError::DuplicateLifterIdNumber(_)
        | MeetError::DuplicateClassName(_) => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Service(ServiceError::Meet(e)) => ErrorBody::from(e),
            Self::Service(ServiceError::Internal(e)) => {
                error!("request failed: {:#}", e);
                ErrorBody {
                    error: "internal_error".to_string(),
                    message: e.to_string(),
                }
            }
            Self::Status { code, message, .. } => ErrorBody {
                error: code.to_string(),
                message: message.clone(),
            },
        };
        (status, Json(body)).into_response()
    }
}
