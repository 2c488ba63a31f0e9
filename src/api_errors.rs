//! Web-boundary error type
//!
//! Flow failures reach the operator as JSON with the request history that
//! was captured before the failure, so the rejected exchange is always
//! inspectable.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::errors::AutomationError;
use crate::flows::{FlowError, FlowErrorKind};
use crate::history::RequestHistoryItem;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Attach the request history captured before the failure.
    pub fn with_history(self, history: Vec<RequestHistoryItem>) -> AppErrorWithHistory {
        AppErrorWithHistory {
            error: self,
            history,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrBody {
    success: bool,
    error: String,
    request_history: Vec<RequestHistoryItem>,
}

fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.with_history(Vec::new()).into_response()
    }
}

/// An `AppError` plus the history it should ship with.
#[derive(Debug)]
pub struct AppErrorWithHistory {
    error: AppError,
    history: Vec<RequestHistoryItem>,
}

impl IntoResponse for AppErrorWithHistory {
    fn into_response(self) -> Response {
        let code = status_for(&self.error);
        let body = ErrBody {
            success: false,
            error: self.error.to_string(),
            request_history: self.history,
        };
        (code, Json(body)).into_response()
    }
}

impl From<AutomationError> for AppError {
    fn from(err: AutomationError) -> Self {
        match &err {
            AutomationError::Validation { .. } => AppError::BadRequest(err.to_string()),
            AutomationError::Auth { .. } => AppError::Unauthorized(err.to_string()),
            AutomationError::NotFound { .. } => AppError::NotFound(err.to_string()),
            AutomationError::Config { .. } | AutomationError::Decryption { .. } => {
                AppError::Internal(err.to_string())
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl From<FlowError> for AppErrorWithHistory {
    fn from(err: FlowError) -> Self {
        let app = match err.kind {
            FlowErrorKind::Validation | FlowErrorKind::Execution => {
                AppError::BadRequest(err.message)
            }
            FlowErrorKind::Auth => AppError::Unauthorized(err.message),
            FlowErrorKind::NotFound => AppError::NotFound(err.message),
            FlowErrorKind::Config | FlowErrorKind::Internal => AppError::Internal(err.message),
        };
        app.with_history(err.history)
    }
}
