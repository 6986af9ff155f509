//! Last-resort question set used when every recovery stage fails.
//!
//! The orchestrator must always have something to persist: a transient
//! formatting problem upstream should cost the user a degraded quiz, not a
//! hard failure.

use crate::domain::{AnswerOptions, OptionLabel, QuestionDraft, QuestionSet};

/// Build the single sentinel draft. Pure; always exactly one question.
pub fn synthesize() -> QuestionSet {
  vec![QuestionDraft {
    question: "Error generating questions".into(),
    options: AnswerOptions {
      a: "Error".into(),
      b: "Error".into(),
      c: "Error".into(),
      d: "Error".into(),
    },
    correct_label: OptionLabel::A,
    explanation: "There was an error generating the questions. Please try again.".into(),
  }]
}
