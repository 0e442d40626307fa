//! HTTP error mapping

use crate::error::{InferenceError, PredictError, ValidationError};
use crate::types::prediction::ErrorResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("{0}")]
    Internal(String),
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => ApiError::Validation(e),
            PredictError::Inference(e) => ApiError::Inference(e),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Inference(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Inference(e) => tracing::error!(error = %e, "Inference failed"),
            ApiError::Internal(msg) => tracing::error!(detail = %msg, "Internal server error"),
            ApiError::BadRequest(_) | ApiError::Validation(_) => {}
        }

        (self.status(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
