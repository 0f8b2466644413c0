//! Error taxonomy for the generation pipeline and its collaborators.
//!
//! Batch-fatal errors (`GenerationError`) only arise before any per-input work
//! starts and map directly to HTTP statuses. Per-input problems are reported as
//! `InputFailure` values and never abort the batch.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::domain::InputKey;
use crate::protocol::ErrorOut;

/// Pre-flight failures that end a batch run.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unexpected(String),
}

impl GenerationError {
    pub fn status(&self) -> StatusCode {
        match self {
            GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
            GenerationError::NotFound(_) => StatusCode::NOT_FOUND,
            GenerationError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "validation",
            GenerationError::NotFound(_) => "not_found",
            GenerationError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<StoreError> for GenerationError {
    fn from(e: StoreError) -> Self {
        GenerationError::Unexpected(e.to_string())
    }
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        tracing::warn!(target: "quizgen", kind = self.kind(), error = %self, "Request failed");
        (self.status(), Json(ErrorOut { error: self.to_string() })).into_response()
    }
}

/// Isolated failure of one input. Logged, the input is skipped, the batch goes on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputFailure {
    #[error("content for {input} could not be resolved: {reason}")]
    PartialResolution { input: InputKey, reason: String },

    #[error("artifact for {input} could not be persisted: {reason}")]
    Persistence { input: InputKey, reason: String },
}

impl InputFailure {
    pub fn input(&self) -> &InputKey {
        match self {
            InputFailure::PartialResolution { input, .. } | InputFailure::Persistence { input, .. } => input,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),

    #[error("store returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("failed to decode store response: {0}")]
    Decode(String),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob fetch failed: {0}")]
    Request(String),

    #[error("blob fetch returned status {status} for {location}")]
    HttpStatus { status: u16, location: String },
}

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("generator request failed: {0}")]
    Request(String),

    #[error("generator returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("generator output could not be parsed: {0}")]
    Parse(String),
}
