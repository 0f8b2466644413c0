//! Quizgen · Quiz Batch Generation Backend
//!
//! - Axum HTTP API that turns a quiz batch into one quiz per student file (or
//!   one per batch from shared course material)
//! - Hosted REST store + blob storage, or an in-memory store seeded from TOML
//! - Optional OpenAI question generator (via environment variables)
//!
//! Important env variables:
//!   PORT                 : u16 (default 3000)
//!   QUIZGEN_CONFIG_PATH  : path to TOML config (settings, prompts, fixtures)
//!   SUPABASE_URL         : hosted project URL; with SUPABASE_SERVICE_KEY enables the REST store
//!   SUPABASE_SERVICE_KEY : service key for the REST store and blob storage
//!   STORAGE_BUCKET       : blob bucket for relative file paths (default "uploads")
//!   OPENAI_API_KEY       : enables the OpenAI question generator if present
//!   OPENAI_BASE_URL      : default "https://api.openai.com/v1"
//!   OPENAI_MODEL         : default "gpt-4o-mini"
//!   LOG_LEVEL            : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT           : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod error;
mod config;
mod store;
mod blob;
mod pipeline;
mod openai;
mod state;
mod protocol;
mod logic;
mod routes;
#[cfg(test)]
mod testkit;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (store clients, generator, orchestrator).
  let state = Arc::new(AppState::from_env().await?);

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "quizgen", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "quizgen", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "quizgen", "Shutdown signal received");
}
