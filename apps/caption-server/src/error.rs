use ai::CaptionError;
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("failed to read upload: {0}")]
    Upload(#[from] MultipartError),

    #[error(transparent)]
    Caption(#[from] CaptionError),

    #[error("caption task failed: {0}")]
    Internal(String),
}

/// Body of every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Always null, a failed request has no image to show.
    pub image: Value,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upload(e) => e.status(),
            Self::Caption(e) if e.is_input_error() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Caption(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::Caption(e) => e.user_message(),
            Self::Upload(_) | Self::Internal(_) => format!("An error occurred: {}", self),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::warn!("request rejected: {}", self);
        }

        let body = ErrorResponse {
            error: self.user_message(),
            image: Value::Null,
        };

        (status, Json(body)).into_response()
    }
}
