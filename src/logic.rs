//! Core behaviors behind the HTTP handlers:
//!   - Creating batches (validated, answer key normalized)
//!   - Running batch generation and shaping its response
//!   - Listing stored artifacts for a batch

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::domain::{GeneratedArtifact, GenerationBatch, OPTION_LABELS};
use crate::error::GenerationError;
use crate::protocol::{CreateBatchIn, GenerateOut};
use crate::state::AppState;

/// Check a batch request and return the normalized answer key.
pub fn validate_new_batch(input: &CreateBatchIn, settings: &Settings) -> Result<Option<Vec<String>>, GenerationError> {
  if input.course_id.trim().is_empty() {
    return Err(GenerationError::Validation("courseId is required".into()));
  }
  let max = settings.max_questions_per_kind;
  if input.mcq_count > max || input.short_answer_count > max {
    return Err(GenerationError::Validation(format!("Question counts must be at most {}", max)));
  }

  let Some(key) = &input.fixed_mcq_answer_key else { return Ok(None) };
  let mut normalized = Vec::with_capacity(key.len());
  for (i, entry) in key.iter().enumerate() {
    let label = entry.trim().to_ascii_uppercase();
    if !OPTION_LABELS.contains(&label.as_str()) {
      return Err(GenerationError::Validation(format!(
        "fixedMcqAnswerKey[{}] must be one of {}, got {:?}",
        i,
        OPTION_LABELS.join("/"),
        entry
      )));
    }
    normalized.push(label);
  }
  if normalized.len() < input.mcq_count as usize {
    warn!(target: "quizgen", key_len = normalized.len(), mcq_count = input.mcq_count, "Answer key shorter than mcqCount; remaining positions use the default");
  }
  Ok(Some(normalized))
}

#[instrument(level = "info", skip(state, input), fields(course_id = %input.course_id, mcq = input.mcq_count, short = input.short_answer_count))]
pub async fn create_batch(state: &AppState, input: CreateBatchIn) -> Result<GenerationBatch, GenerationError> {
  let key = validate_new_batch(&input, &state.settings)?;
  let batch = GenerationBatch {
    id: Uuid::new_v4().to_string(),
    course_id: input.course_id.trim().to_string(),
    lecture_id: input.lecture_id.filter(|l| !l.trim().is_empty()),
    mcq_count: input.mcq_count,
    short_answer_count: input.short_answer_count,
    fixed_mcq_answer_key: key,
    created_by: input.created_by,
    created_at: Utc::now(),
  };
  let stored = state.store.insert_batch(batch).await?;
  info!(target: "quizgen", batch_id = %stored.id, "Batch created");
  Ok(stored)
}

#[instrument(level = "info", skip(state))]
pub async fn generate_quizzes(state: &AppState, batch_id: Option<&str>) -> Result<GenerateOut, GenerationError> {
  let batch_id = batch_id
    .map(str::trim)
    .filter(|id| !id.is_empty())
    .ok_or_else(|| GenerationError::Validation("Batch ID is required".into()))?;

  let report = state.orchestrator.run(batch_id).await?;
  for failure in &report.skipped {
    warn!(target: "quizgen", batch_id = %report.batch_id, input = %failure.input(), error = %failure, "Input omitted from response");
  }
  info!(target: "quizgen", batch_id = %report.batch_id, mode = ?report.mode, quizzes = report.artifacts.len(), "Quiz generation finished");
  Ok(GenerateOut { success: true, quizzes: report.artifacts })
}

pub async fn list_quizzes(state: &AppState, batch_id: &str) -> Result<Vec<GeneratedArtifact>, GenerationError> {
  state.orchestrator.list_artifacts(batch_id).await
}
