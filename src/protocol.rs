//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GeneratedArtifact, GenerationBatch};

//
// Quiz generation
//

#[derive(Debug, Deserialize)]
pub struct GenerateIn {
    #[serde(rename = "batchId", alias = "batch_id", default)]
    pub batch_id: Option<String>,
}

#[derive(Serialize)]
pub struct GenerateOut {
    pub success: bool,
    pub quizzes: Vec<GeneratedArtifact>,
}

#[derive(Serialize)]
pub struct QuizzesOut {
    pub quizzes: Vec<GeneratedArtifact>,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
}

//
// Batches
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchIn {
    #[serde(alias = "course_id")]
    pub course_id: String,
    #[serde(default, alias = "lecture_id")]
    pub lecture_id: Option<String>,
    #[serde(default, alias = "mcq_count")]
    pub mcq_count: u32,
    #[serde(default, alias = "short_answer_count")]
    pub short_answer_count: u32,
    #[serde(default, alias = "fixed_mcq_answer_key")]
    pub fixed_mcq_answer_key: Option<Vec<String>>,
    #[serde(default, alias = "created_by")]
    pub created_by: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOut {
    pub id: String,
    pub course_id: String,
    pub lecture_id: Option<String>,
    pub mcq_count: u32,
    pub short_answer_count: u32,
    pub fixed_mcq_answer_key: Option<Vec<String>>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Convert the stored batch to the public DTO.
pub fn to_out(b: &GenerationBatch) -> BatchOut {
    BatchOut {
        id: b.id.clone(),
        course_id: b.course_id.clone(),
        lecture_id: b.lecture_id.clone(),
        mcq_count: b.mcq_count,
        short_answer_count: b.short_answer_count,
        fixed_mcq_answer_key: b.fixed_mcq_answer_key.clone(),
        created_by: b.created_by.clone(),
        created_at: b.created_at,
    }
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
