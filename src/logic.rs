//! Core behaviors shared by the HTTP handlers.
//!
//! The generation path is: resolve the caller to an owner id, ask the
//! completion boundary for raw text, recover a question set from it (or
//! synthesize the fallback), then run the persistence saga. Generation and
//! persistence failures are reported differently on purpose: regenerating
//! costs another model call, while persistence can be retried cheaply, so a
//! failed save still returns the generated set to the caller.

use tracing::{info, instrument, warn};

use crate::domain::{QuestionRecord, QuestionSet, QuizMetadata, QuizRecord};
use crate::error::{ApiError, PersistError};
use crate::fallback;
use crate::openrouter::Completion;
use crate::persist::persist_quiz;
use crate::recovery::recover;
use crate::state::AppState;
use crate::store::{Datastore, NewQuiz};
use crate::util::char_prefix;

/// Stored excerpt is capped so we never persist whole documents.
const SOURCE_EXCERPT_CHARS: usize = 1000;

/// Credential pair presented with a request: the bearer token and the
/// identity provider's user id it belongs to.
#[derive(Clone, Debug)]
pub struct AuthContext {
  pub bearer: String,
  pub external_user_id: String,
}

#[derive(Clone, Debug)]
pub struct GenerateRequest {
  pub content: String,
  pub requested_count: u32,
  pub filename: String,
}

/// What the orchestrator hands back on a successful generation.
#[derive(Debug)]
pub enum GenerationOutcome {
  /// Quiz and questions are durable.
  Persisted { quiz: QuizRecord, questions: Vec<QuestionRecord>, metadata: QuizMetadata },
  /// Generation succeeded but the save failed; the drafts are returned so
  /// the model's work is not lost.
  Unpersisted { drafts: QuestionSet, metadata: QuizMetadata, error: PersistError },
}

/// Resolve the caller to an owner id, rejecting before any model spend.
#[instrument(level = "debug", skip(state, auth), fields(external_user_id = %auth.external_user_id))]
pub async fn resolve_owner(state: &AppState, auth: &AuthContext) -> Result<String, ApiError> {
  if auth.bearer.trim().is_empty() || auth.external_user_id.trim().is_empty() {
    return Err(ApiError::Authorization("missing user id or bearer token".into()));
  }
  match state.store.find_owner(&auth.external_user_id).await? {
    Some(owner_id) => Ok(owner_id),
    None => Err(ApiError::Authorization("user not found".into())),
  }
}

/// Full generation pipeline.
#[instrument(level = "info", skip(state, auth, req), fields(count = req.requested_count, content_len = req.content.len(), filename = %req.filename))]
pub async fn generate(
  state: &AppState,
  auth: &AuthContext,
  req: GenerateRequest,
) -> Result<GenerationOutcome, ApiError> {
  if req.content.trim().is_empty() {
    return Err(ApiError::BadRequest("content is required".into()));
  }
  let owner_id = resolve_owner(state, auth).await?;

  let openrouter = state
    .openrouter
    .as_ref()
    .ok_or_else(|| ApiError::Upstream("completion boundary not configured".into()))?;
  let completion = openrouter
    .generate_questions_raw(&state.prompts, &req.content, req.requested_count)
    .await?;

  Ok(commit_generation(&state.store, &owner_id, &req, completion).await)
}

/// Everything after the completion boundary: recover-or-fallback, then the
/// persistence saga. Infallible by design; persistence trouble is carried
/// inside the outcome.
pub async fn commit_generation(
  store: &Datastore,
  owner_id: &str,
  req: &GenerateRequest,
  completion: Completion,
) -> GenerationOutcome {
  let set = match recover(&completion.content) {
    Ok(recovered) => {
      info!(target: "recovery", stage = recovered.stage, questions = recovered.set.len(), "Question set recovered");
      recovered.set
    }
    Err(e) => {
      warn!(target: "recovery", stage = e.stage, detail = %e.detail, "Recovery exhausted; synthesizing fallback");
      fallback::synthesize()
    }
  };

  // The decoded count is persisted as-is; requested_question_count in the
  // metadata lets callers detect a mismatch.
  let metadata = QuizMetadata {
    model_name: completion.model,
    token_usage: completion.usage,
    requested_question_count: req.requested_count,
  };
  let new_quiz = NewQuiz {
    owner_id: owner_id.to_string(),
    title: format!("Quiz {}", req.filename),
    description: "Automatically generated quiz".into(),
    source_excerpt: char_prefix(&req.content, SOURCE_EXCERPT_CHARS),
    metadata: metadata.clone(),
  };

  match persist_quiz(store, new_quiz, &set).await {
    Ok(persisted) => {
      info!(target: "persist", quiz_id = %persisted.quiz.id, questions = persisted.questions.len(), "Quiz persisted");
      GenerationOutcome::Persisted {
        quiz: persisted.quiz,
        questions: persisted.questions,
        metadata,
      }
    }
    Err(error) => {
      warn!(target: "persist", error = %error, "Quiz not persisted; returning generated drafts");
      GenerationOutcome::Unpersisted { drafts: set, metadata, error }
    }
  }
}

/// One quiz with its questions, visible only to its owner. A quiz owned by
/// someone else reports not-found rather than forbidden.
#[instrument(level = "info", skip(state, auth), fields(%quiz_id))]
pub async fn fetch_quiz(
  state: &AppState,
  auth: &AuthContext,
  quiz_id: &str,
) -> Result<(QuizRecord, Vec<QuestionRecord>), ApiError> {
  let owner_id = resolve_owner(state, auth).await?;
  let quiz = state.store.get_quiz(quiz_id).await?.ok_or(ApiError::QuizNotFound)?;
  if quiz.owner_id != owner_id {
    return Err(ApiError::QuizNotFound);
  }
  let questions = state.store.questions_for_quiz(quiz_id).await?;
  Ok((quiz, questions))
}

/// All of the caller's quizzes with nested questions, newest first.
#[instrument(level = "info", skip(state, auth))]
pub async fn list_quizzes(
  state: &AppState,
  auth: &AuthContext,
) -> Result<Vec<(QuizRecord, Vec<QuestionRecord>)>, ApiError> {
  let owner_id = resolve_owner(state, auth).await?;
  let quizzes = state.store.list_quizzes(&owner_id).await?;
  let mut out = Vec::with_capacity(quizzes.len());
  for quiz in quizzes {
    let questions = state.store.questions_for_quiz(&quiz.id).await?;
    out.push((quiz, questions));
  }
  Ok(out)
}
