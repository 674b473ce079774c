use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::documents::loader::LoaderError;
use crate::documents::uploads::UploadError;
use crate::llm_client::LlmError;
use crate::retrieval::embedder::EmbedderError;
use crate::retrieval::RetrievalError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Messages are echoed to the client, matching what the chat front end expects
/// to show inline.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Malformed multipart request: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Could not read document: {0}")]
    Document(#[from] LoaderError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidJson(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            // 413 when the body limit is hit, 400 for malformed forms
            AppError::Multipart(e) => (e.status(), "MULTIPART_ERROR"),
            AppError::Document(_) => (StatusCode::UNPROCESSABLE_ENTITY, "UNREADABLE_DOCUMENT"),
            AppError::Upload(UploadError::InvalidName(_)) => {
                (StatusCode::BAD_REQUEST, "INVALID_FILE_NAME")
            }
            AppError::Upload(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPLOAD_ERROR"),
            AppError::Embedding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EMBEDDING_ERROR"),
            AppError::Retrieval(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RETRIEVAL_ERROR"),
            AppError::Llm(_) => (StatusCode::INTERNAL_SERVER_ERROR, "LLM_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("Error processing request: {self:?}");
        } else {
            tracing::warn!("Rejected request: {message}");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
