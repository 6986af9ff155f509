//! Error taxonomy for the generation service, and the mapping from errors to
//! HTTP responses.
//!
//! Requests fail in five distinct ways with different blame and different
//! retry economics:
//!   - Authorization: credential does not resolve; rejected before any model
//!     spend.
//!   - Upstream: completion boundary unreachable / non-2xx / wrong shape;
//!     never retried here.
//!   - Store/NotFound/BadRequest: local request or store problems.
//! Persistence failures after a successful generation are NOT in this enum:
//! the orchestrator returns the generated set with a distinct status instead
//! of discarding the model's work (see `logic::GenerationOutcome`).

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde_json::json;
use thiserror::Error;

/// Store-level failure, shared by both datastore backends.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store request failed: {0}")]
  Transport(#[from] reqwest::Error),
  #[error("store rejected request ({status}): {message}")]
  Rejected { status: u16, message: String },
  #[error("store returned an unexpected shape: {0}")]
  Shape(String),
  #[error("injected failure")]
  Injected,
}

/// Which step of the two-step quiz write failed.
/// `QuestionsFailed` means the compensating delete of the quiz row has
/// already been attempted; callers must not assume the quiz ever existed.
#[derive(Debug, Error)]
pub enum PersistError {
  #[error("quiz insert failed: {0}")]
  QuizFailed(#[source] StoreError),
  #[error("questions insert failed (quiz rolled back): {0}")]
  QuestionsFailed(#[source] StoreError),
}

/// Request-fatal errors surfaced to the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("authorization failed: {0}")]
  Authorization(String),
  #[error("completion boundary failed: {0}")]
  Upstream(String),
  #[error("quiz not found")]
  QuizNotFound,
  #[error("store error: {0}")]
  Store(#[from] StoreError),
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Authorization(_) => {
        (StatusCode::UNAUTHORIZED, "User ID and authorization token are required".to_string())
      }
      ApiError::Upstream(_) => {
        (StatusCode::BAD_GATEWAY, "Failed to generate questions".to_string())
      }
      ApiError::QuizNotFound => (StatusCode::NOT_FOUND, "Quiz not found".to_string()),
      ApiError::Store(e) => {
        tracing::error!(target: "quizgen_backend", error = %e, "Store error surfaced to client");
        (StatusCode::INTERNAL_SERVER_ERROR, "Database request failed".to_string())
      }
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
    };
    let body = json!({
      "success": false,
      "message": message,
      "error": self.to_string(),
    });
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn persist_error_reports_which_step_failed() {
    let quiz = PersistError::QuizFailed(StoreError::Injected);
    let questions = PersistError::QuestionsFailed(StoreError::Injected);
    assert!(quiz.to_string().contains("quiz insert"));
    assert!(questions.to_string().contains("rolled back"));
  }

  #[test]
  fn status_codes_follow_the_taxonomy() {
    let cases = [
      (ApiError::Authorization("no token".into()), StatusCode::UNAUTHORIZED),
      (ApiError::Upstream("HTTP 500".into()), StatusCode::BAD_GATEWAY),
      (ApiError::QuizNotFound, StatusCode::NOT_FOUND),
      (ApiError::BadRequest("content is required".into()), StatusCode::BAD_REQUEST),
    ];
    for (err, expected) in cases {
      assert_eq!(err.into_response().status(), expected);
    }
  }
}
