//! Quizgen · Document-to-Quiz Backend
//!
//! - Axum HTTP API: generate a multiple-choice quiz from extracted document
//!   text, fetch and list persisted quizzes
//! - OpenRouter completion integration (via environment variables)
//! - Supabase persistence, or an in-memory store when unconfigured
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENROUTER_API_KEY  : enables quiz generation if present
//!   OPENROUTER_BASE_URL : default "https://openrouter.ai/api/v1"
//!   OPENROUTER_MODEL    : default "google/gemma-3n-e4b-it"
//!   SUPABASE_URL        : enables durable persistence if present
//!   SUPABASE_ANON_KEY   : Supabase credential, paired with SUPABASE_URL
//!   AGENT_CONFIG_PATH   : path to TOML config (prompt overrides)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod recovery;
mod fallback;
mod openrouter;
mod store;
mod persist;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (store backend, completion client, prompts).
  let state = Arc::new(AppState::new());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizgen_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
