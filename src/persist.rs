//! Two-step quiz persistence with compensating rollback.
//!
//! The store offers no transaction spanning the quizzes and questions tables,
//! so the write is an explicit saga: insert the quiz, batch-insert its
//! questions, and delete the quiz again if the batch fails. From the caller's
//! point of view either both records exist or neither does.

use tracing::{debug, error, instrument, warn};

use crate::domain::{QuestionRecord, QuestionSet, QuizRecord};
use crate::error::PersistError;
use crate::store::{Datastore, NewQuestion, NewQuiz};

/// Saga progress. The only forced transition is
/// `QuizCommitted -> RolledBack` when the questions batch fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SagaState {
  QuizPending,
  QuizCommitted,
  QuestionsCommitted,
  RolledBack,
}

/// Durable result of a successful saga.
#[derive(Clone, Debug)]
pub struct PersistedQuiz {
  pub quiz: QuizRecord,
  pub questions: Vec<QuestionRecord>,
}

/// Insert one quiz and its question batch.
///
/// On `QuestionsFailed` the quiz row has already been deleted again; callers
/// must not assume it ever existed. On `QuizFailed` nothing was written.
#[instrument(level = "info", skip(store, quiz, set), fields(owner_id = %quiz.owner_id, questions = set.len()))]
pub async fn persist_quiz(
  store: &Datastore,
  quiz: NewQuiz,
  set: &QuestionSet,
) -> Result<PersistedQuiz, PersistError> {
  let mut state = SagaState::QuizPending;
  debug!(target: "persist", ?state, "Saga started");

  let quiz_row = store.insert_quiz(quiz).await.map_err(PersistError::QuizFailed)?;
  state = SagaState::QuizCommitted;
  debug!(target: "persist", ?state, quiz_id = %quiz_row.id, "Quiz row committed");

  let rows: Vec<NewQuestion> = set
    .iter()
    .map(|draft| NewQuestion {
      quiz_id: quiz_row.id.clone(),
      question_text: draft.question.clone(),
      options: draft.options.clone(),
      correct_label: draft.correct_label,
      explanation: draft.explanation.clone(),
    })
    .collect();

  match store.insert_questions(rows).await {
    Ok(questions) => {
      state = SagaState::QuestionsCommitted;
      debug!(target: "persist", ?state, quiz_id = %quiz_row.id, count = questions.len(), "Questions committed");
      Ok(PersistedQuiz { quiz: quiz_row, questions })
    }
    Err(batch_err) => {
      warn!(target: "persist", quiz_id = %quiz_row.id, error = %batch_err, "Questions batch failed; compensating");
      if let Err(del_err) = store.delete_quiz(&quiz_row.id).await {
        // The original error still wins; the orphan is only logged.
        error!(target: "persist", quiz_id = %quiz_row.id, error = %del_err, "Compensating delete failed; quiz row orphaned");
      }
      state = SagaState::RolledBack;
      debug!(target: "persist", ?state, quiz_id = %quiz_row.id, "Saga rolled back");
      Err(PersistError::QuestionsFailed(batch_err))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{QuizMetadata, TokenUsage};
  use crate::fallback;
  use crate::store::MemoryStore;

  fn new_quiz() -> NewQuiz {
    NewQuiz {
      owner_id: "owner-1".into(),
      title: "Quiz notes.pdf".into(),
      description: "Automatically generated quiz".into(),
      source_excerpt: "some text".into(),
      metadata: QuizMetadata {
        model_name: "test-model".into(),
        token_usage: TokenUsage::default(),
        requested_question_count: 1,
      },
    }
  }

  #[tokio::test]
  async fn success_writes_quiz_and_all_questions() {
    let store = Datastore::Memory(MemoryStore::new());
    let set = fallback::synthesize();
    let persisted = persist_quiz(&store, new_quiz(), &set).await.expect("persists");

    assert_eq!(persisted.questions.len(), set.len());
    assert!(persisted.questions.iter().all(|q| q.quiz_id == persisted.quiz.id));
    let stored = store.get_quiz(&persisted.quiz.id).await.unwrap();
    assert!(stored.is_some());
  }

  #[tokio::test]
  async fn failed_batch_rolls_back_the_quiz_row() {
    let store = Datastore::Memory(MemoryStore::failing_questions());
    let set = fallback::synthesize();
    let err = persist_quiz(&store, new_quiz(), &set).await.unwrap_err();

    assert!(matches!(err, PersistError::QuestionsFailed(_)));
    // Zero durable rows: the compensating delete removed the quiz.
    assert!(store.list_quizzes("owner-1").await.unwrap().is_empty());
  }
}
