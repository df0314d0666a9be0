use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use contextor::{ContextorError, FailureKind};
use thiserror::Error;

use crate::core::chat_store::StoreError;
use crate::core::http::response_envelope::ApiResponse;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- IO / network / server ---
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Chat threads ---
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Failure of the RAG chain or one of its remote services.
    #[error(transparent)]
    Chain(#[from] ContextorError),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            // 4xx
            AppError::Store(StoreError::EmptyName) => StatusCode::BAD_REQUEST,
            AppError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::Duplicate(_) | StoreError::Busy(_)) => StatusCode::CONFLICT,

            // chain failures by kind
            AppError::Chain(e) => match e.kind() {
                FailureKind::InvalidInput => StatusCode::BAD_REQUEST,
                FailureKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
                FailureKind::ExternalService | FailureKind::StreamInterrupted => {
                    StatusCode::BAD_GATEWAY
                }
            },

            // 5xx
            AppError::Bind { .. } | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Bind { .. } => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::Store(StoreError::EmptyName) => "EMPTY_CHAT_NAME",
            AppError::Store(StoreError::Duplicate(_)) => "CHAT_EXISTS",
            AppError::Store(StoreError::NotFound(_)) => "CHAT_NOT_FOUND",
            AppError::Store(StoreError::Busy(_)) => "CHAT_BUSY",
            AppError::Chain(e) => match e.kind() {
                FailureKind::InvalidInput => "INVALID_QUESTION",
                FailureKind::Configuration => "CONFIG_ERROR",
                FailureKind::ExternalService => "UPSTREAM_ERROR",
                FailureKind::StreamInterrupted => "STREAM_INTERRUPTED",
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }
        ApiResponse::<()>::error(self.error_code(), self.to_string(), Vec::new())
            .with_status(status)
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;
