//! Application state: prompts, the optional completion client, and the store.
//!
//! Everything here is built once at startup from the environment. Requests
//! share it read-only; the pipeline itself keeps no state between requests.

use tracing::{info, instrument};

use crate::config::{load_agent_config_from_env, Prompts};
use crate::openrouter::OpenRouter;
use crate::store::Datastore;

pub struct AppState {
  pub prompts: Prompts,
  pub openrouter: Option<OpenRouter>,
  pub store: Datastore,
}

impl AppState {
  /// Build state from env: load prompt config, pick the store backend,
  /// init the completion client if credentials are present.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let prompts = load_agent_config_from_env().map(|c| c.prompts).unwrap_or_default();

    let openrouter = OpenRouter::from_env();
    match &openrouter {
      Some(or) => {
        info!(target: "quizgen_backend", base_url = %or.base_url, model = %or.model, "OpenRouter enabled")
      }
      None => {
        info!(target: "quizgen_backend", "OpenRouter disabled (no OPENROUTER_API_KEY); generation requests will fail upstream")
      }
    }

    let store = Datastore::from_env();

    Self { prompts, openrouter, store }
  }
}
