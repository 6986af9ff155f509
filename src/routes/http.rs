//! HTTP endpoint handlers. These are thin wrappers that forward to core
//! logic; all policy (auth gating, fallback, rollback) lives below them.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{header, HeaderMap},
  Json,
};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic::{self, AuthContext, GenerateRequest, GenerationOutcome};
use crate::protocol::*;
use crate::state::AppState;

/// Pull the bearer token out of the Authorization header, empty if absent.
fn bearer_from(headers: &HeaderMap) -> String {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .unwrap_or_default()
    .trim()
    .to_string()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> Json<HealthOut> {
  Json(HealthOut {
    ok: true,
    database_configured: state.store.is_durable(),
    completion_configured: state.openrouter.is_some(),
  })
}

#[instrument(level = "info", skip(state, headers, body), fields(count = body.num_questions, content_len = body.content.len(), filename = %body.filename))]
pub async fn http_generate_questions(
  State(state): State<Arc<AppState>>,
  headers: HeaderMap,
  Json(body): Json<GenerateIn>,
) -> Result<Json<GenerateOut>, ApiError> {
  let auth = AuthContext { bearer: bearer_from(&headers), external_user_id: body.user_id };
  let req = GenerateRequest {
    content: body.content,
    requested_count: body.num_questions,
    filename: body.filename,
  };

  let out = match logic::generate(&state, &auth, req).await? {
    GenerationOutcome::Persisted { quiz, questions, metadata } => {
      info!(target: "quizgen_backend", quiz_id = %quiz.id, questions = questions.len(), "Generation persisted");
      GenerateOut {
        success: true,
        message: "Quiz and questions created successfully".into(),
        quiz: Some(quiz_out(quiz)),
        questions: QuestionsOut::Persisted(questions.into_iter().map(question_out).collect()),
        metadata: MetadataOut {
          num_questions: metadata.requested_question_count,
          model: metadata.model_name,
          usage: metadata.token_usage,
        },
        db_error: None,
      }
    }
    GenerationOutcome::Unpersisted { drafts, metadata, error } => {
      info!(target: "quizgen_backend", drafts = drafts.len(), "Generation returned unpersisted");
      GenerateOut {
        success: true,
        message: "Questions generated but not saved".into(),
        quiz: None,
        questions: QuestionsOut::Drafts(drafts.into_iter().map(draft_out).collect()),
        metadata: MetadataOut {
          num_questions: metadata.requested_question_count,
          model: metadata.model_name,
          usage: metadata.token_usage,
        },
        db_error: Some(error.to_string()),
      }
    }
  };
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, headers))]
pub async fn http_list_quizzes(
  State(state): State<Arc<AppState>>,
  Query(q): Query<OwnerQuery>,
  headers: HeaderMap,
) -> Result<Json<QuizListOut>, ApiError> {
  let auth = AuthContext { bearer: bearer_from(&headers), external_user_id: q.user_id };
  let quizzes = logic::list_quizzes(&state, &auth).await?;
  info!(target: "quizgen_backend", count = quizzes.len(), "Quiz list served");
  Ok(Json(QuizListOut {
    success: true,
    quizzes: quizzes
      .into_iter()
      .map(|(quiz, questions)| quiz_with_questions_out(quiz, questions))
      .collect(),
  }))
}

#[instrument(level = "info", skip(state, headers), fields(quiz_id = %id))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(q): Query<OwnerQuery>,
  headers: HeaderMap,
) -> Result<Json<QuizFetchOut>, ApiError> {
  let auth = AuthContext { bearer: bearer_from(&headers), external_user_id: q.user_id };
  let (quiz, questions) = logic::fetch_quiz(&state, &auth, &id).await?;
  info!(target: "quizgen_backend", quiz_id = %quiz.id, questions = questions.len(), "Quiz served");
  Ok(Json(QuizFetchOut { success: true, quiz: quiz_with_questions_out(quiz, questions) }))
}
