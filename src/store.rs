//! Data store boundary.
//!
//! The persistence coordinator and read handlers only ever need four write
//! primitives (owner lookup by external id, single-row insert returning the
//! row, batch insert returning rows, delete by id) plus three read paths.
//! Two backends provide them behind one enum:
//!
//! - `Supabase`: PostgREST REST calls against a hosted Postgres. No
//!   multi-table transaction is available to our credentials, which is why
//!   the coordinator compensates manually.
//! - `Memory`: RwLock'd maps. Used when Supabase env is absent and by tests;
//!   carries a fail-injection flag so the rollback path can be exercised.

use std::collections::HashMap;

use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{AnswerOptions, OptionLabel, QuestionRecord, QuizMetadata, QuizRecord};
use crate::error::StoreError;
use crate::util::trunc_for_log;

/// Quiz row about to be inserted; the store assigns id and created_at.
#[derive(Clone, Debug)]
pub struct NewQuiz {
  pub owner_id: String,
  pub title: String,
  pub description: String,
  pub source_excerpt: String,
  pub metadata: QuizMetadata,
}

/// Question row about to be inserted as part of one quiz's batch.
#[derive(Clone, Debug)]
pub struct NewQuestion {
  pub quiz_id: String,
  pub question_text: String,
  pub options: AnswerOptions,
  pub correct_label: OptionLabel,
  pub explanation: String,
}

/// Backend dispatch. Both variants expose the same async surface.
pub enum Datastore {
  Supabase(SupabaseStore),
  Memory(MemoryStore),
}

impl Datastore {
  /// Supabase when SUPABASE_URL + SUPABASE_ANON_KEY are present, otherwise
  /// the in-memory store (useful for local development without credentials).
  pub fn from_env() -> Self {
    match SupabaseStore::from_env() {
      Some(s) => {
        info!(target: "quizgen_backend", base_url = %s.base_url, "Supabase store enabled");
        Datastore::Supabase(s)
      }
      None => {
        info!(target: "quizgen_backend", "No Supabase credentials; using in-memory store");
        Datastore::Memory(MemoryStore::new())
      }
    }
  }

  pub fn is_durable(&self) -> bool {
    matches!(self, Datastore::Supabase(_))
  }

  /// Lookup-by-external-id: resolve an identity-provider user id to our
  /// owner id.
  pub async fn find_owner(&self, external_id: &str) -> Result<Option<String>, StoreError> {
    match self {
      Datastore::Supabase(s) => s.find_owner(external_id).await,
      Datastore::Memory(m) => m.find_owner(external_id).await,
    }
  }

  pub async fn insert_quiz(&self, quiz: NewQuiz) -> Result<QuizRecord, StoreError> {
    match self {
      Datastore::Supabase(s) => s.insert_quiz(quiz).await,
      Datastore::Memory(m) => m.insert_quiz(quiz).await,
    }
  }

  pub async fn insert_questions(
    &self,
    rows: Vec<NewQuestion>,
  ) -> Result<Vec<QuestionRecord>, StoreError> {
    match self {
      Datastore::Supabase(s) => s.insert_questions(rows).await,
      Datastore::Memory(m) => m.insert_questions(rows).await,
    }
  }

  pub async fn delete_quiz(&self, quiz_id: &str) -> Result<(), StoreError> {
    match self {
      Datastore::Supabase(s) => s.delete_quiz(quiz_id).await,
      Datastore::Memory(m) => m.delete_quiz(quiz_id).await,
    }
  }

  pub async fn get_quiz(&self, quiz_id: &str) -> Result<Option<QuizRecord>, StoreError> {
    match self {
      Datastore::Supabase(s) => s.get_quiz(quiz_id).await,
      Datastore::Memory(m) => m.get_quiz(quiz_id).await,
    }
  }

  pub async fn questions_for_quiz(
    &self,
    quiz_id: &str,
  ) -> Result<Vec<QuestionRecord>, StoreError> {
    match self {
      Datastore::Supabase(s) => s.questions_for_quiz(quiz_id).await,
      Datastore::Memory(m) => m.questions_for_quiz(quiz_id).await,
    }
  }

  /// Owner's quizzes, newest first.
  pub async fn list_quizzes(&self, owner_id: &str) -> Result<Vec<QuizRecord>, StoreError> {
    match self {
      Datastore::Supabase(s) => s.list_quizzes(owner_id).await,
      Datastore::Memory(m) => m.list_quizzes(owner_id).await,
    }
  }
}

// --- Supabase (PostgREST) backend ---

pub struct SupabaseStore {
  client: reqwest::Client,
  base_url: String,
  anon_key: String,
}

#[derive(Deserialize)]
struct IdRow {
  id: String,
}

// Wire rows keep the original column names; domain names stay ours.
#[derive(Serialize)]
struct QuizInsertRow<'a> {
  user_id: &'a str,
  title: &'a str,
  description: &'a str,
  source_content: &'a str,
  metadata: &'a QuizMetadata,
}

#[derive(Deserialize)]
struct QuizRow {
  id: String,
  user_id: String,
  title: String,
  description: String,
  source_content: String,
  created_at: chrono::DateTime<Utc>,
  metadata: QuizMetadata,
}

impl From<QuizRow> for QuizRecord {
  fn from(r: QuizRow) -> Self {
    QuizRecord {
      id: r.id,
      owner_id: r.user_id,
      title: r.title,
      description: r.description,
      source_excerpt: r.source_content,
      created_at: r.created_at,
      metadata: r.metadata,
    }
  }
}

#[derive(Serialize)]
struct QuestionInsertRow<'a> {
  quiz_id: &'a str,
  question: &'a str,
  options: &'a AnswerOptions,
  correct_answer: OptionLabel,
  explanation: &'a str,
  created_at: chrono::DateTime<Utc>,
}

#[derive(Deserialize)]
struct QuestionRow {
  id: String,
  quiz_id: String,
  question: String,
  options: AnswerOptions,
  correct_answer: OptionLabel,
  explanation: String,
  created_at: chrono::DateTime<Utc>,
}

impl From<QuestionRow> for QuestionRecord {
  fn from(r: QuestionRow) -> Self {
    QuestionRecord {
      id: r.id,
      quiz_id: r.quiz_id,
      question_text: r.question,
      options: r.options,
      correct_label: r.correct_answer,
      explanation: r.explanation,
      created_at: r.created_at,
    }
  }
}

impl SupabaseStore {
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("SUPABASE_URL").ok()?;
    let anon_key = std::env::var("SUPABASE_ANON_KEY").ok()?;
    let client = reqwest::Client::builder()
      .timeout(std::time::Duration::from_secs(15))
      .build()
      .ok()?;
    Some(Self { client, base_url, anon_key })
  }

  fn table(&self, name: &str) -> String {
    format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), name)
  }

  fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    req
      .header("apikey", &self.anon_key)
      .header(AUTHORIZATION, format!("Bearer {}", self.anon_key))
      .header(CONTENT_TYPE, "application/json")
  }

  async fn check(res: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    if res.status().is_success() {
      Ok(res)
    } else {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      Err(StoreError::Rejected { status, message: trunc_for_log(&body, 300) })
    }
  }

  #[instrument(level = "debug", skip(self))]
  async fn find_owner(&self, external_id: &str) -> Result<Option<String>, StoreError> {
    let res = self
      .authed(self.client.get(self.table("users")))
      .query(&[
        ("clerk_id", format!("eq.{external_id}")),
        ("select", "id".into()),
        ("limit", "1".into()),
      ])
      .send()
      .await?;
    let rows: Vec<IdRow> = Self::check(res).await?.json().await?;
    Ok(rows.into_iter().next().map(|r| r.id))
  }

  #[instrument(level = "debug", skip(self, quiz), fields(owner_id = %quiz.owner_id))]
  async fn insert_quiz(&self, quiz: NewQuiz) -> Result<QuizRecord, StoreError> {
    let row = QuizInsertRow {
      user_id: &quiz.owner_id,
      title: &quiz.title,
      description: &quiz.description,
      source_content: &quiz.source_excerpt,
      metadata: &quiz.metadata,
    };
    let res = self
      .authed(self.client.post(self.table("quizzes")))
      .header("Prefer", "return=representation")
      .json(&row)
      .send()
      .await?;
    let mut rows: Vec<QuizRow> = Self::check(res).await?.json().await?;
    match rows.pop() {
      Some(r) => Ok(r.into()),
      None => Err(StoreError::Shape("insert returned no quiz row".into())),
    }
  }

  #[instrument(level = "debug", skip(self, rows), fields(count = rows.len()))]
  async fn insert_questions(
    &self,
    rows: Vec<NewQuestion>,
  ) -> Result<Vec<QuestionRecord>, StoreError> {
    let now = Utc::now();
    let wire: Vec<QuestionInsertRow<'_>> = rows
      .iter()
      .map(|q| QuestionInsertRow {
        quiz_id: &q.quiz_id,
        question: &q.question_text,
        options: &q.options,
        correct_answer: q.correct_label,
        explanation: &q.explanation,
        created_at: now,
      })
      .collect();
    let res = self
      .authed(self.client.post(self.table("questions")))
      .header("Prefer", "return=representation")
      .json(&wire)
      .send()
      .await?;
    let inserted: Vec<QuestionRow> = Self::check(res).await?.json().await?;
    if inserted.len() != rows.len() {
      return Err(StoreError::Shape(format!(
        "batch insert returned {} rows, expected {}",
        inserted.len(),
        rows.len()
      )));
    }
    Ok(inserted.into_iter().map(Into::into).collect())
  }

  #[instrument(level = "debug", skip(self))]
  async fn delete_quiz(&self, quiz_id: &str) -> Result<(), StoreError> {
    let res = self
      .authed(self.client.delete(self.table("quizzes")))
      .query(&[("id", format!("eq.{quiz_id}"))])
      .send()
      .await?;
    Self::check(res).await?;
    Ok(())
  }

  #[instrument(level = "debug", skip(self))]
  async fn get_quiz(&self, quiz_id: &str) -> Result<Option<QuizRecord>, StoreError> {
    let res = self
      .authed(self.client.get(self.table("quizzes")))
      .query(&[("id", format!("eq.{quiz_id}")), ("select", "*".into())])
      .send()
      .await?;
    let mut rows: Vec<QuizRow> = Self::check(res).await?.json().await?;
    Ok(rows.pop().map(Into::into))
  }

  #[instrument(level = "debug", skip(self))]
  async fn questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<QuestionRecord>, StoreError> {
    let res = self
      .authed(self.client.get(self.table("questions")))
      .query(&[
        ("quiz_id", format!("eq.{quiz_id}")),
        ("select", "*".into()),
        ("order", "created_at.asc".into()),
      ])
      .send()
      .await?;
    let rows: Vec<QuestionRow> = Self::check(res).await?.json().await?;
    Ok(rows.into_iter().map(Into::into).collect())
  }

  #[instrument(level = "debug", skip(self))]
  async fn list_quizzes(&self, owner_id: &str) -> Result<Vec<QuizRecord>, StoreError> {
    let res = self
      .authed(self.client.get(self.table("quizzes")))
      .query(&[
        ("user_id", format!("eq.{owner_id}")),
        ("select", "*".into()),
        ("order", "created_at.desc".into()),
      ])
      .send()
      .await?;
    let rows: Vec<QuizRow> = Self::check(res).await?.json().await?;
    Ok(rows.into_iter().map(Into::into).collect())
  }
}

// --- In-memory backend ---

#[derive(Default)]
pub struct MemoryStore {
  owners: RwLock<HashMap<String, String>>,
  quizzes: RwLock<HashMap<String, QuizRecord>>,
  questions: RwLock<HashMap<String, Vec<QuestionRecord>>>,
  /// When set, `insert_questions` fails. Lets tests force the rollback path.
  pub fail_question_inserts: bool,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store whose question batch inserts always fail; for rollback tests.
  #[allow(dead_code)]
  pub fn failing_questions() -> Self {
    Self { fail_question_inserts: true, ..Self::default() }
  }

  /// Seed one known external id -> owner id mapping.
  #[allow(dead_code)]
  pub async fn add_owner(&self, external_id: &str) -> String {
    let owner_id = Uuid::new_v4().to_string();
    self.owners.write().await.insert(external_id.to_string(), owner_id.clone());
    owner_id
  }

  async fn find_owner(&self, external_id: &str) -> Result<Option<String>, StoreError> {
    Ok(self.owners.read().await.get(external_id).cloned())
  }

  async fn insert_quiz(&self, quiz: NewQuiz) -> Result<QuizRecord, StoreError> {
    let record = QuizRecord {
      id: Uuid::new_v4().to_string(),
      owner_id: quiz.owner_id,
      title: quiz.title,
      description: quiz.description,
      source_excerpt: quiz.source_excerpt,
      created_at: Utc::now(),
      metadata: quiz.metadata,
    };
    self.quizzes.write().await.insert(record.id.clone(), record.clone());
    Ok(record)
  }

  async fn insert_questions(
    &self,
    rows: Vec<NewQuestion>,
  ) -> Result<Vec<QuestionRecord>, StoreError> {
    if self.fail_question_inserts {
      return Err(StoreError::Injected);
    }
    let now = Utc::now();
    let mut out = Vec::with_capacity(rows.len());
    let mut table = self.questions.write().await;
    for q in rows {
      let record = QuestionRecord {
        id: Uuid::new_v4().to_string(),
        quiz_id: q.quiz_id.clone(),
        question_text: q.question_text,
        options: q.options,
        correct_label: q.correct_label,
        explanation: q.explanation,
        created_at: now,
      };
      table.entry(q.quiz_id).or_default().push(record.clone());
      out.push(record);
    }
    Ok(out)
  }

  async fn delete_quiz(&self, quiz_id: &str) -> Result<(), StoreError> {
    self.quizzes.write().await.remove(quiz_id);
    self.questions.write().await.remove(quiz_id);
    Ok(())
  }

  async fn get_quiz(&self, quiz_id: &str) -> Result<Option<QuizRecord>, StoreError> {
    Ok(self.quizzes.read().await.get(quiz_id).cloned())
  }

  async fn questions_for_quiz(&self, quiz_id: &str) -> Result<Vec<QuestionRecord>, StoreError> {
    Ok(self.questions.read().await.get(quiz_id).cloned().unwrap_or_default())
  }

  async fn list_quizzes(&self, owner_id: &str) -> Result<Vec<QuizRecord>, StoreError> {
    let mut out: Vec<QuizRecord> = self
      .quizzes
      .read()
      .await
      .values()
      .filter(|q| q.owner_id == owner_id)
      .cloned()
      .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::TokenUsage;

  fn new_quiz(owner: &str) -> NewQuiz {
    NewQuiz {
      owner_id: owner.into(),
      title: "Quiz doc.pdf".into(),
      description: "Automatically generated quiz".into(),
      source_excerpt: "excerpt".into(),
      metadata: QuizMetadata {
        model_name: "test-model".into(),
        token_usage: TokenUsage::default(),
        requested_question_count: 3,
      },
    }
  }

  #[tokio::test]
  async fn memory_store_round_trips_quiz_and_questions() {
    let store = Datastore::Memory(MemoryStore::new());
    let quiz = store.insert_quiz(new_quiz("owner-1")).await.unwrap();
    let rows = vec![NewQuestion {
      quiz_id: quiz.id.clone(),
      question_text: "Q".into(),
      options: AnswerOptions { a: "1".into(), b: "2".into(), c: "3".into(), d: "4".into() },
      correct_label: OptionLabel::C,
      explanation: "e".into(),
    }];
    let saved = store.insert_questions(rows).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].quiz_id, quiz.id);

    let fetched = store.get_quiz(&quiz.id).await.unwrap().expect("quiz exists");
    assert_eq!(fetched.title, "Quiz doc.pdf");
    assert_eq!(store.questions_for_quiz(&quiz.id).await.unwrap().len(), 1);

    store.delete_quiz(&quiz.id).await.unwrap();
    assert!(store.get_quiz(&quiz.id).await.unwrap().is_none());
    assert!(store.questions_for_quiz(&quiz.id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn memory_store_lists_only_the_owners_quizzes() {
    let store = Datastore::Memory(MemoryStore::new());
    store.insert_quiz(new_quiz("owner-a")).await.unwrap();
    store.insert_quiz(new_quiz("owner-a")).await.unwrap();
    store.insert_quiz(new_quiz("owner-b")).await.unwrap();
    assert_eq!(store.list_quizzes("owner-a").await.unwrap().len(), 2);
    assert_eq!(store.list_quizzes("owner-b").await.unwrap().len(), 1);
    assert!(store.list_quizzes("owner-c").await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn unknown_external_id_resolves_to_none() {
    let mem = MemoryStore::new();
    let owner = mem.add_owner("clerk-123").await;
    let store = Datastore::Memory(mem);
    assert_eq!(store.find_owner("clerk-123").await.unwrap(), Some(owner));
    assert_eq!(store.find_owner("clerk-999").await.unwrap(), None);
  }

  #[test]
  fn quiz_wire_row_uses_original_column_names() {
    let meta = QuizMetadata {
      model_name: "m".into(),
      token_usage: TokenUsage::default(),
      requested_question_count: 1,
    };
    let row = QuizInsertRow {
      user_id: "u",
      title: "t",
      description: "d",
      source_content: "s",
      metadata: &meta,
    };
    let v = serde_json::to_value(&row).unwrap();
    assert!(v.get("user_id").is_some());
    assert!(v.get("source_content").is_some());
    assert!(v.get("owner_id").is_none());
  }
}
