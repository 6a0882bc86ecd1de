//! Error types for Circulate server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::clients::ClientError;
use crate::models::LoanStatus;
use crate::store::StoreError;

/// Application error codes exposed to API consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    DbFailure = 2,
    NoSuchData = 3,
    InvalidState = 4,
    BadValue = 5,
    Duplicate = 6,
    DependencyUnavailable = 7,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{message}")]
    InvalidState {
        /// Status of the record that failed the precondition, when the
        /// violation is about a specific record.
        current: Option<LoanStatus>,
        message: String,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Dependency unavailable: {service}: {reason}")]
    DependencyUnavailable {
        service: &'static str,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchData, msg.clone())
            }
            AppError::InvalidState { current, message } => {
                let detail = match current {
                    Some(state) => format!("{} (current state: {})", message, state),
                    None => message.clone(),
                };
                (StatusCode::CONFLICT, ErrorCode::InvalidState, detail)
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::DependencyUnavailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::DependencyUnavailable,
                self.to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(format!("Loan {} not found", id)),
            StoreError::StatusConflict { actual } => AppError::InvalidState {
                current: Some(actual),
                message: "Loan is not in a valid state for this operation".to_string(),
            },
            StoreError::OpenLoanExists(item_id) => {
                AppError::Conflict(format!("Item {} already has an open loan", item_id))
            }
            StoreError::Integrity(msg) => AppError::Internal(msg),
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Conversion used when a dependency call fails during a mutating command.
/// Read-side snapshot fetches never go through this path: they degrade by
/// omitting the snapshot instead.
pub fn dependency_error(service: &'static str, e: ClientError) -> AppError {
    match e {
        ClientError::NotFound(what) => AppError::NotFound(what),
        ClientError::Timeout => AppError::DependencyUnavailable {
            service,
            reason: "request timed out".to_string(),
        },
        ClientError::Unavailable(reason) => AppError::DependencyUnavailable { service, reason },
        ClientError::BadResponse(reason) => AppError::DependencyUnavailable { service, reason },
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
