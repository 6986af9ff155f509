//! Prompt configuration, with built-in defaults and optional TOML override.
//!
//! The defaults are tuned for strict-JSON MCQ generation; override them via a
//! TOML file at AGENT_CONFIG_PATH only if you need to adjust tone or schema
//! wording. The user template takes `{count}` and `{content}`.

use serde::Deserialize;
use tracing::{error, info};

/// Prompts used by the completion client.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  pub mcq_system: String,
  pub mcq_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      mcq_system: r#"You are an expert MCQ (multiple-choice question) creation assistant. You MUST respond with valid JSON only.

When given:
1. A number N (desired number of questions)
2. A block of text called TEXT (extracted from a PDF)

RESPONSE REQUIREMENTS:
- You MUST respond with a valid JSON object
- The response will be automatically parsed as JSON
- NO additional text, explanations, or formatting allowed
- Follow the exact schema specified below

REQUIRED JSON SCHEMA:
{
  "questions": [
    {
      "question": "string - the question text",
      "options": {
        "A": "string - option A text",
        "B": "string - option B text",
        "C": "string - option C text",
        "D": "string - option D text"
      },
      "answer": "string - single letter A, B, C, or D",
      "explanation": "string - 1-2 sentence justification"
    }
  ]
}

CONTENT RULES:
- Generate exactly N questions based ONLY on TEXT content
- Each question tests comprehension of concepts from TEXT
- Create four distinct, plausible options with ONE correct answer
- Ensure correct answer is definitively supported by TEXT
- Write clear explanations referencing TEXT information
- Test different concepts (avoid repetition)
- If insufficient TEXT content, use: {"question": "Insufficient information", "options": {"A": "Unknown", "B": "Unknown", "C": "Unknown", "D": "Unknown"}, "answer": "A", "explanation": "Insufficient source material"}

JSON VALIDATION REQUIREMENTS:
- All property names must use double quotes
- All string values must use double quotes
- Properly escape internal quotes with backslash
- No trailing commas
- No comments or extra formatting
- Valid JSON syntax throughout"#
        .into(),
      mcq_user_template:
        " N: {count} GENERATE EXACTLY THIS AMOUNT OF QUESTIONS,\n TEXT: {content}".into(),
    }
  }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AgentConfig {
  #[serde(default = "default_prompts")]
  pub prompts: Prompts,
}

fn default_prompts() -> Prompts {
  Prompts::default()
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO
/// error, returns None and the caller falls back to defaults.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "quizgen_backend", %path, "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quizgen_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quizgen_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
