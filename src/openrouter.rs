//! Minimal OpenRouter client for our single use-case.
//!
//! We only call chat.completions, always requesting a strict JSON object.
//! Calls are instrumented and log model names, latencies, and response sizes
//! (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::Prompts;
use crate::domain::TokenUsage;
use crate::error::ApiError;
use crate::util::fill_template;

/// Raw result of one completion call: the text blob the recovery parser will
/// work on, plus provenance for quiz metadata.
#[derive(Clone, Debug)]
pub struct Completion {
  pub content: String,
  pub model: String,
  pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct OpenRouter {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenRouter {
  /// Construct the client if we find OPENROUTER_API_KEY; otherwise None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENROUTER_API_KEY").ok()?;
    let base_url = std::env::var("OPENROUTER_BASE_URL")
      .unwrap_or_else(|_| "https://openrouter.ai/api/v1".into());
    let model =
      std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| "google/gemma-3n-e4b-it".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// Ask the model for `count` questions over `content`. Returns the raw
  /// completion text; no parsing happens here. Any transport failure or
  /// unexpected response shape is `ApiError::Upstream` and is not retried.
  #[instrument(level = "info", skip(self, prompts, content), fields(model = %self.model, count, content_len = content.len()))]
  pub async fn generate_questions_raw(
    &self,
    prompts: &Prompts,
    content: &str,
    count: u32,
  ) -> Result<Completion, ApiError> {
    let url = format!("{}/chat/completions", self.base_url);
    let user = fill_template(
      &prompts.mcq_user_template,
      &[("count", &count.to_string()), ("content", content)],
    );
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: prompts.mcq_system.clone() },
        ChatMessageReq { role: "user".into(), content: user },
      ],
      response_format: ResponseFormat { r#type: "json_object".into() },
      temperature: 0.3,
      max_tokens: 3000,
      top_p: 0.9,
      stream: false,
    };

    let start = std::time::Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "quizgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| ApiError::Upstream(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_upstream_error(&body).unwrap_or(body);
      return Err(ApiError::Upstream(format!("HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| ApiError::Upstream(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        "OpenRouter usage"
      );
    }

    // The whole downstream pipeline hangs off choices[0].message.content;
    // anything else in the body is a transport-level failure.
    let content = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .filter(|s| !s.is_empty())
      .ok_or_else(|| ApiError::Upstream("response carried no message content".into()))?;

    info!(elapsed = ?start.elapsed(), response_len = content.len(), "Completion received");

    Ok(Completion {
      content,
      model: body.model.unwrap_or_else(|| self.model.clone()),
      usage: body.usage.unwrap_or_default(),
    })
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  response_format: ResponseFormat,
  temperature: f32,
  max_tokens: u32,
  top_p: f32,
  stream: bool,
}
#[derive(Serialize)]
struct ChatMessageReq {
  role: String,
  content: String,
}
#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  r#type: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  model: Option<String>,
  #[serde(default)]
  usage: Option<TokenUsage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  content: Option<String>,
}

/// Try to extract a clean error message from an upstream error body.
fn extract_upstream_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn upstream_error_bodies_are_mined_for_messages() {
    let body = r#"{"error":{"message":"rate limited","code":429}}"#;
    assert_eq!(extract_upstream_error(body).as_deref(), Some("rate limited"));
    assert_eq!(extract_upstream_error("plain text"), None);
  }

  #[test]
  fn response_shape_tolerates_missing_model_and_usage() {
    let body = r#"{"choices":[{"message":{"content":"{}"}}]}"#;
    let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
    assert!(parsed.model.is_none());
    assert!(parsed.usage.is_none());
    assert_eq!(parsed.choices[0].message.content.as_deref(), Some("{}"));
  }
}
