//! Public request/response DTOs for the HTTP endpoints (serde ready).
//! Keep this small and stable so backend and frontend evolve independently.

use serde::{Deserialize, Serialize};

use crate::domain::{
  AnswerOptions, OptionLabel, QuestionDraft, QuestionRecord, QuizMetadata, QuizRecord,
};

/// Body of POST /api/generate-questions.
#[derive(Debug, Deserialize)]
pub struct GenerateIn {
  pub content: String,
  #[serde(rename = "numQuestions", default = "default_num_questions")]
  pub num_questions: u32,
  #[serde(rename = "userId", default)]
  pub user_id: String,
  #[serde(default)]
  pub filename: String,
}

fn default_num_questions() -> u32 {
  10
}

/// Query string of the quiz read endpoints.
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
  #[serde(rename = "userId", default)]
  pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
  #[serde(rename = "databaseConfigured")]
  pub database_configured: bool,
  #[serde(rename = "completionConfigured")]
  pub completion_configured: bool,
}

/// Persisted quiz as exposed upward.
#[derive(Debug, Serialize)]
pub struct QuizOut {
  pub id: String,
  pub title: String,
  pub description: String,
  pub source_excerpt: String,
  pub created_at: chrono::DateTime<chrono::Utc>,
  pub metadata: QuizMetadata,
}

/// Persisted question as exposed upward.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
  pub id: String,
  pub quiz_id: String,
  pub question: String,
  pub options: AnswerOptions,
  pub correct_answer: OptionLabel,
  pub explanation: String,
  pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Unpersisted draft returned when generation succeeded but the save failed.
#[derive(Debug, Serialize)]
pub struct DraftOut {
  pub question: String,
  pub options: AnswerOptions,
  pub answer: OptionLabel,
  pub explanation: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QuestionsOut {
  Persisted(Vec<QuestionOut>),
  Drafts(Vec<DraftOut>),
}

#[derive(Debug, Serialize)]
pub struct MetadataOut {
  #[serde(rename = "numQuestions")]
  pub num_questions: u32,
  pub model: String,
  pub usage: crate::domain::TokenUsage,
}

/// Envelope of POST /api/generate-questions. `quiz` is absent and `db_error`
/// present when generation succeeded but persistence failed.
#[derive(Debug, Serialize)]
pub struct GenerateOut {
  pub success: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub quiz: Option<QuizOut>,
  pub questions: QuestionsOut,
  pub metadata: MetadataOut,
  #[serde(rename = "dbError", skip_serializing_if = "Option::is_none")]
  pub db_error: Option<String>,
}

/// Quiz with its nested questions, for the fetch/list endpoints.
#[derive(Debug, Serialize)]
pub struct QuizWithQuestionsOut {
  #[serde(flatten)]
  pub quiz: QuizOut,
  pub questions: Vec<QuestionOut>,
}

#[derive(Debug, Serialize)]
pub struct QuizFetchOut {
  pub success: bool,
  pub quiz: QuizWithQuestionsOut,
}

#[derive(Debug, Serialize)]
pub struct QuizListOut {
  pub success: bool,
  pub quizzes: Vec<QuizWithQuestionsOut>,
}

// --- Converters from domain records ---

pub fn quiz_out(q: QuizRecord) -> QuizOut {
  QuizOut {
    id: q.id,
    title: q.title,
    description: q.description,
    source_excerpt: q.source_excerpt,
    created_at: q.created_at,
    metadata: q.metadata,
  }
}

pub fn question_out(q: QuestionRecord) -> QuestionOut {
  QuestionOut {
    id: q.id,
    quiz_id: q.quiz_id,
    question: q.question_text,
    options: q.options,
    correct_answer: q.correct_label,
    explanation: q.explanation,
    created_at: q.created_at,
  }
}

pub fn draft_out(d: QuestionDraft) -> DraftOut {
  DraftOut {
    question: d.question,
    options: d.options,
    answer: d.correct_label,
    explanation: d.explanation,
  }
}

pub fn quiz_with_questions_out(q: QuizRecord, questions: Vec<QuestionRecord>) -> QuizWithQuestionsOut {
  QuizWithQuestionsOut {
    quiz: quiz_out(q),
    questions: questions.into_iter().map(question_out).collect(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn num_questions_defaults_to_ten() {
    let body: GenerateIn =
      serde_json::from_str(r#"{"content":"text","userId":"u1","filename":"f.pdf"}"#).unwrap();
    assert_eq!(body.num_questions, 10);
    let body: GenerateIn =
      serde_json::from_str(r#"{"content":"text","numQuestions":3,"userId":"u1"}"#).unwrap();
    assert_eq!(body.num_questions, 3);
  }

  #[test]
  fn generate_out_omits_quiz_and_db_error_when_absent() {
    let out = GenerateOut {
      success: true,
      message: "ok".into(),
      quiz: None,
      questions: QuestionsOut::Drafts(vec![]),
      metadata: MetadataOut {
        num_questions: 2,
        model: "m".into(),
        usage: Default::default(),
      },
      db_error: None,
    };
    let v = serde_json::to_value(&out).unwrap();
    assert!(v.get("quiz").is_none());
    assert!(v.get("dbError").is_none());
    assert_eq!(v["metadata"]["numQuestions"], 2);
  }
}
