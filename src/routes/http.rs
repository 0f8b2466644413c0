//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{rejection::JsonRejection, Path, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::GenerationError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  body: Result<Json<GenerateIn>, JsonRejection>,
) -> Result<Json<GenerateOut>, GenerationError> {
  let Json(body) = body.map_err(|e| GenerationError::Validation(e.body_text()))?;
  let out = generate_quizzes(&state, body.batch_id.as_deref()).await?;
  info!(target: "quizgen", batch_id = ?body.batch_id, quizzes = out.quizzes.len(), "HTTP generate served");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_post_batch(
  State(state): State<Arc<AppState>>,
  body: Result<Json<CreateBatchIn>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchOut>), GenerationError> {
  let Json(body) = body.map_err(|e| GenerationError::Validation(e.body_text()))?;
  let batch = create_batch(&state, body).await?;
  Ok((StatusCode::CREATED, Json(to_out(&batch))))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_batch_quizzes(
  State(state): State<Arc<AppState>>,
  Path(batch_id): Path<String>,
) -> Result<Json<QuizzesOut>, GenerationError> {
  let quizzes = list_quizzes(&state, &batch_id).await?;
  info!(target: "quizgen", %batch_id, quizzes = quizzes.len(), "HTTP quizzes listed");
  Ok(Json(QuizzesOut { quizzes }))
}
