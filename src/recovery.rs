//! Recovery of structured question data from raw model output.
//!
//! The model is instructed to emit one JSON object, but real completions come
//! back fenced in markdown, with smart punctuation, with mangled escapes, or
//! as plain prose. Instead of one big try/catch cascade we run a fixed,
//! ordered list of candidate-producing stages, cheapest and most reversible
//! first, and accept the first candidate that both parses as JSON and
//! validates against the question schema:
//!
//! 1. `verbatim`         - the raw text as-is
//! 2. `strip_fences`     - drop markdown code-fence markers
//! 3. `normalize_quotes` - escape stray quotes, wrap in braces if missing
//! 4. `aggressive`       - straighten smart quotes, collapse whitespace,
//!                         double backslashes, re-escape quotes
//! 5. `destructive`      - as 4, but strip backslashes entirely (lossy)
//!
//! A candidate that parses but has the wrong shape is treated exactly like a
//! parse failure: the pipeline moves on to the next stage. Every stage is a
//! pure function of the raw input, so `recover` is deterministic.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{AnswerOptions, OptionLabel, QuestionDraft, QuestionSet};

/// Successful recovery: the drafts plus which stage produced them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recovered {
  pub set: QuestionSet,
  pub stage: &'static str,
}

/// All stages exhausted. Carries the last stage's error for diagnostics;
/// callers absorb this via the fallback synthesizer rather than failing the
/// request.
#[derive(Debug, Error)]
#[error("all recovery stages exhausted; last error at `{stage}`: {detail}")]
pub struct RecoveryFailure {
  pub stage: &'static str,
  pub detail: String,
}

/// Outcome of decode+validate for one candidate document.
enum StageOutcome {
  Decoded(QuestionSet),
  ParseFailed(String),
  ValidationFailed(String),
}

/// Wire shape the model was asked for. Unknown extra fields are tolerated at
/// the document and question level; `options` must be exactly A-D.
#[derive(Deserialize)]
struct RawPayload {
  questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
  question: String,
  options: AnswerOptions,
  answer: OptionLabel,
  explanation: String,
}

/// Run the cascade. First stage whose candidate parses and validates wins.
pub fn recover(raw: &str) -> Result<Recovered, RecoveryFailure> {
  let stages: [(&'static str, fn(&str) -> Option<String>); 5] = [
    ("verbatim", verbatim),
    ("strip_fences", strip_fences),
    ("normalize_quotes", normalize_quotes),
    ("aggressive", aggressive),
    ("destructive", destructive),
  ];

  let mut last_stage = "verbatim";
  let mut last_error = String::from("no candidate produced");

  for (name, stage) in stages {
    let Some(candidate) = stage(raw) else {
      debug!(target: "recovery", stage = name, "Stage produced no candidate; skipping");
      continue;
    };
    match decode_and_validate(&candidate) {
      StageOutcome::Decoded(set) => {
        debug!(target: "recovery", stage = name, questions = set.len(), "Candidate accepted");
        return Ok(Recovered { set, stage: name });
      }
      StageOutcome::ParseFailed(e) => {
        debug!(target: "recovery", stage = name, error = %e, "Candidate failed to parse");
        last_stage = name;
        last_error = format!("parse: {e}");
      }
      StageOutcome::ValidationFailed(e) => {
        debug!(target: "recovery", stage = name, error = %e, "Candidate failed validation");
        last_stage = name;
        last_error = format!("validation: {e}");
      }
    }
  }

  Err(RecoveryFailure { stage: last_stage, detail: last_error })
}

/// Parse, then check the schema. Splitting the two steps is what lets us
/// distinguish ParseFailed from ValidationFailed in logs; the pipeline
/// treats both the same way.
fn decode_and_validate(candidate: &str) -> StageOutcome {
  let value: serde_json::Value = match serde_json::from_str(candidate) {
    Ok(v) => v,
    Err(e) => return StageOutcome::ParseFailed(e.to_string()),
  };
  let payload: RawPayload = match serde_json::from_value(value) {
    Ok(p) => p,
    Err(e) => return StageOutcome::ValidationFailed(e.to_string()),
  };
  if payload.questions.is_empty() {
    return StageOutcome::ValidationFailed("`questions` array is empty".into());
  }
  if let Some(i) = payload.questions.iter().position(|q| q.question.trim().is_empty()) {
    return StageOutcome::ValidationFailed(format!("question {i} has empty text"));
  }
  let set = payload
    .questions
    .into_iter()
    .map(|q| QuestionDraft {
      question: q.question,
      options: q.options,
      correct_label: q.answer,
      explanation: q.explanation,
    })
    .collect();
  StageOutcome::Decoded(set)
}

// --- Stages ---

fn verbatim(raw: &str) -> Option<String> {
  Some(raw.to_string())
}

/// Drop leading/trailing markdown fence markers (with optional `json` tag).
/// None when the text carries no fence, so the pipeline skips the re-parse.
fn strip_fences(raw: &str) -> Option<String> {
  let mut body = raw.trim();
  let mut changed = false;
  if let Some(rest) = body.strip_prefix("```") {
    body = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    changed = true;
  }
  if let Some(rest) = body.strip_suffix("```") {
    body = rest.trim_end();
    changed = true;
  }
  changed.then(|| body.to_string())
}

/// Stages 3-5 start from the fence-stripped form: fence markers would defeat
/// every later repair, and stripping is itself pure.
fn defenced(raw: &str) -> String {
  strip_fences(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Escape stray quotes (already-escaped ones are preserved) and make sure the
/// text is wrapped in a single brace pair.
fn normalize_quotes(raw: &str) -> Option<String> {
  let mut s = escape_unescaped_quotes(&defenced(raw));
  if !s.starts_with('{') {
    s.insert(0, '{');
  }
  if !s.ends_with('}') {
    s.push('}');
  }
  Some(s)
}

/// Straight quotes, single-space whitespace, doubled backslashes, re-escaped
/// quotes. Reversible damage only; escape sequences survive doubled.
fn aggressive(raw: &str) -> Option<String> {
  let s = straighten_quotes(&defenced(raw));
  let s = collapse_whitespace(&s);
  let s = s.replace('\\', "\\\\");
  Some(escape_unescaped_quotes(&s))
}

/// Last resort: same cleanup as `aggressive` but backslashes are stripped
/// outright. Loses literal backslash content, but rescues output whose escape
/// sequences were already mangled upstream.
fn destructive(raw: &str) -> Option<String> {
  let s = straighten_quotes(&defenced(raw));
  let s = collapse_whitespace(&s);
  Some(s.replace('\\', ""))
}

// --- Pure text helpers ---

fn straighten_quotes(s: &str) -> String {
  s.chars()
    .map(|c| match c {
      '\u{2018}' | '\u{2019}' => '\'',
      '\u{201C}' | '\u{201D}' => '"',
      other => other,
    })
    .collect()
}

fn collapse_whitespace(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Put a backslash before every double quote that does not already follow
/// one. Quotes directly preceded by a backslash are left alone.
fn escape_unescaped_quotes(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut prev = '\0';
  for ch in s.chars() {
    if ch == '"' && prev != '\\' {
      out.push('\\');
    }
    out.push(ch);
    prev = ch;
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::OptionLabel;

  const VALID: &str = r#"{"questions":[{"question":"Q1","options":{"A":"x","B":"y","C":"z","D":"w"},"answer":"B","explanation":"e"}]}"#;

  #[test]
  fn verbatim_valid_json_wins_at_stage_one() {
    let r = recover(VALID).expect("recovers");
    assert_eq!(r.stage, "verbatim");
    assert_eq!(r.set.len(), 1);
    assert_eq!(r.set[0].question, "Q1");
    assert_eq!(r.set[0].correct_label, OptionLabel::B);
    assert_eq!(r.set[0].options.get(OptionLabel::B), "y");
  }

  #[test]
  fn fenced_json_wins_at_stage_two_with_identical_set() {
    let fenced = format!("```json\n{VALID}\n```");
    let direct = recover(VALID).unwrap();
    let r = recover(&fenced).expect("recovers");
    assert_eq!(r.stage, "strip_fences");
    assert_eq!(r.set, direct.set);
  }

  #[test]
  fn fence_without_language_tag_is_stripped_too() {
    let fenced = format!("```\n{VALID}\n```");
    assert_eq!(recover(&fenced).unwrap().stage, "strip_fences");
  }

  #[test]
  fn smart_quoted_json_falls_through_to_destructive() {
    let smart = VALID.replace('"', "\u{201C}");
    let r = recover(&smart).expect("recovers");
    assert_eq!(r.stage, "destructive");
    assert_eq!(r.set[0].correct_label, OptionLabel::B);
  }

  #[test]
  fn escaped_json_blob_recovers_at_destructive() {
    // A completion that arrived as an escaped string body rather than JSON.
    let escaped = VALID.replace('"', "\\\"");
    let r = recover(&escaped).expect("recovers");
    assert_eq!(r.stage, "destructive");
    assert_eq!(r.set.len(), 1);
  }

  #[test]
  fn json_with_raw_newlines_inside_strings_recovers() {
    let broken = VALID.replace("\"Q1\"", "\"Q\n1\"");
    let r = recover(&broken).expect("recovers");
    assert_eq!(r.set[0].question, "Q 1");
  }

  #[test]
  fn missing_questions_field_fails_every_stage() {
    let err = recover(r#"{"items":[]}"#).unwrap_err();
    assert!(err.detail.contains("questions"), "got: {}", err.detail);
  }

  #[test]
  fn empty_questions_array_is_a_validation_failure() {
    let err = recover(r#"{"questions":[]}"#).unwrap_err();
    assert!(err.detail.contains("empty"));
  }

  #[test]
  fn missing_option_label_invalidates_whole_candidate() {
    let missing_d = r#"{"questions":[{"question":"Q","options":{"A":"x","B":"y","C":"z"},"answer":"A","explanation":"e"}]}"#;
    assert!(recover(missing_d).is_err());
  }

  #[test]
  fn answer_outside_a_to_d_invalidates_candidate() {
    let bad = VALID.replace("\"answer\":\"B\"", "\"answer\":\"E\"");
    assert!(recover(&bad).is_err());
  }

  #[test]
  fn one_malformed_question_rejects_a_document_with_good_ones() {
    let mixed = r#"{"questions":[
      {"question":"Q1","options":{"A":"x","B":"y","C":"z","D":"w"},"answer":"B","explanation":"e"},
      {"question":"Q2","options":{"A":"x"},"answer":"A","explanation":"e"}
    ]}"#;
    assert!(recover(mixed).is_err());
  }

  #[test]
  fn plain_prose_exhausts_all_stages() {
    assert!(recover("not json at all").is_err());
  }

  #[test]
  fn recover_is_deterministic() {
    let raw = format!("```json\n{VALID}\n```");
    let a = recover(&raw).unwrap();
    let b = recover(&raw).unwrap();
    assert_eq!(a.stage, b.stage);
    assert_eq!(a.set, b.set);
  }

  // Stage transforms in isolation.

  #[test]
  fn strip_fences_skips_unfenced_text() {
    assert_eq!(strip_fences("{\"a\":1}"), None);
    assert_eq!(strip_fences("```json\n{}\n```").as_deref(), Some("{}"));
  }

  #[test]
  fn normalize_quotes_wraps_braces_and_keeps_escapes() {
    let out = normalize_quotes("k: \\\"v\\\"").unwrap();
    assert!(out.starts_with('{') && out.ends_with('}'));
    assert!(out.contains("\\\"v\\\""));
  }

  #[test]
  fn aggressive_collapses_whitespace_and_doubles_backslashes() {
    let out = aggressive("a\n\n  b\\c").unwrap();
    assert_eq!(out, "a b\\\\c");
  }

  #[test]
  fn destructive_strips_backslashes_and_straightens_quotes() {
    let out = destructive("\u{201C}a\u{201D}\\n  b").unwrap();
    assert_eq!(out, "\"a\"n b");
  }
}
