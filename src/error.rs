use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ndarray::ShapeError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("model file not found at path: {0}")]
    ModelNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("model configuration error: {0}")]
    ModelConfig(String),

    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error("output shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ServiceError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            // Load-time errors never reach a handler; anything else
            // here is a per-request inference failure.
            _ => {
                tracing::error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
