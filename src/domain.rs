//! Domain models: question drafts produced by the recovery pipeline and the
//! persisted quiz/question records they become.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four option labels a multiple-choice question may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionLabel {
  A,
  B,
  C,
  D,
}

/// Exactly the four labeled option texts. Decoding rejects a missing label or
/// any extra key, which is what enforces the "exactly A–D" schema rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerOptions {
  #[serde(rename = "A")]
  pub a: String,
  #[serde(rename = "B")]
  pub b: String,
  #[serde(rename = "C")]
  pub c: String,
  #[serde(rename = "D")]
  pub d: String,
}

impl AnswerOptions {
  #[allow(dead_code)]
  pub fn get(&self, label: OptionLabel) -> &str {
    match label {
      OptionLabel::A => &self.a,
      OptionLabel::B => &self.b,
      OptionLabel::C => &self.c,
      OptionLabel::D => &self.d,
    }
  }
}

/// One unpersisted question as produced by the recovery parser or the
/// fallback synthesizer. Immutable once built; `correct_label` always refers
/// to a populated option because `AnswerOptions` carries all four by
/// construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
  pub question: String,
  pub options: AnswerOptions,
  pub correct_label: OptionLabel,
  pub explanation: String,
}

/// Ordered set of drafts, length >= 1.
pub type QuestionSet = Vec<QuestionDraft>;

/// Token accounting reported by the completion boundary. All fields optional;
/// some upstreams omit usage entirely.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TokenUsage {
  #[serde(default)]
  pub prompt_tokens: Option<u32>,
  #[serde(default)]
  pub completion_tokens: Option<u32>,
  #[serde(default)]
  pub total_tokens: Option<u32>,
}

/// Provenance stored alongside a quiz.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizMetadata {
  pub model_name: String,
  pub token_usage: TokenUsage,
  pub requested_question_count: u32,
}

/// Persisted quiz row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizRecord {
  pub id: String,
  pub owner_id: String,
  pub title: String,
  pub description: String,
  pub source_excerpt: String,
  pub created_at: DateTime<Utc>,
  pub metadata: QuizMetadata,
}

/// Persisted question row, many-to-one to its quiz. Never updated after
/// creation; deleted only as the compensating action of a failed batch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuestionRecord {
  pub id: String,
  pub quiz_id: String,
  pub question_text: String,
  pub options: AnswerOptions,
  pub correct_label: OptionLabel,
  pub explanation: String,
  pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn options() -> AnswerOptions {
    AnswerOptions { a: "w".into(), b: "x".into(), c: "y".into(), d: "z".into() }
  }

  #[test]
  fn option_label_serde_uses_bare_letters() {
    assert_eq!(serde_json::to_string(&OptionLabel::C).unwrap(), "\"C\"");
    let l: OptionLabel = serde_json::from_str("\"B\"").unwrap();
    assert_eq!(l, OptionLabel::B);
    assert!(serde_json::from_str::<OptionLabel>("\"E\"").is_err());
  }

  #[test]
  fn answer_options_reject_missing_or_extra_labels() {
    assert!(serde_json::from_str::<AnswerOptions>(r#"{"A":"1","B":"2","C":"3"}"#).is_err());
    assert!(
      serde_json::from_str::<AnswerOptions>(r#"{"A":"1","B":"2","C":"3","D":"4","E":"5"}"#)
        .is_err()
    );
    let ok: AnswerOptions =
      serde_json::from_str(r#"{"A":"1","B":"2","C":"3","D":"4"}"#).unwrap();
    assert_eq!(ok.get(OptionLabel::D), "4");
  }

  #[test]
  fn correct_label_always_resolves_to_an_option() {
    let draft = QuestionDraft {
      question: "q".into(),
      options: options(),
      correct_label: OptionLabel::D,
      explanation: "e".into(),
    };
    assert_eq!(draft.options.get(draft.correct_label), "z");
  }
}
