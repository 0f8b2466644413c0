//! Domain models used by the backend: batches, input materials, synthesized
//! question/answer sets and the persisted artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Option labels every multiple-choice item carries, in display order.
pub const OPTION_LABELS: [&str; 4] = ["A", "B", "C", "D"];

/// Configuration for one generation run. Immutable once stored.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationBatch {
  pub id: String,
  pub course_id: String,
  #[serde(default)] pub lecture_id: Option<String>,
  #[serde(default)] pub mcq_count: u32,
  #[serde(default)] pub short_answer_count: u32,
  #[serde(default)] pub fixed_mcq_answer_key: Option<Vec<String>>,
  #[serde(default)] pub created_by: Option<String>,
  #[serde(default = "Utc::now")] pub created_at: DateTime<Utc>,
}

impl GenerationBatch {
  pub fn scope(&self) -> BatchScope {
    match &self.lecture_id {
      Some(lecture_id) => BatchScope::Lecture {
        course_id: self.course_id.clone(),
        lecture_id: lecture_id.clone(),
      },
      None => BatchScope::Course { course_id: self.course_id.clone() },
    }
  }
}

/// What the shared materials of a batch are drawn from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchScope {
  Course { course_id: String },
  Lecture { course_id: String, lecture_id: String },
}

impl BatchScope {
  pub fn course_id(&self) -> &str {
    match self {
      BatchScope::Course { course_id } | BatchScope::Lecture { course_id, .. } => course_id,
    }
  }
}

/// Student-scoped vs shared source content.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
  StudentFile,
  SharedMaterial,
}

impl InputKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      InputKind::StudentFile => "student_file",
      InputKind::SharedMaterial => "shared_material",
    }
  }
}

impl std::fmt::Display for InputKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Identity of one input within the store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputKey {
  pub kind: InputKind,
  pub id: String,
}

impl std::fmt::Display for InputKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.kind, self.id)
  }
}

/// One unit of source content. Read-only during generation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InputMaterial {
  pub id: String,
  pub kind: InputKind,
  pub name: String,
  /// Blob path or absolute URL.
  pub location: String,
  #[serde(default)] pub content_type: Option<String>,
  /// Set only for `StudentFile`.
  #[serde(default)] pub student_id: Option<String>,
}

impl InputMaterial {
  pub fn key(&self) -> InputKey {
    InputKey { kind: self.kind, id: self.id.clone() }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
  pub id: String,
  #[serde(default)] pub full_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct McqOption {
  pub label: String,
  pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct McqQuestion {
  pub number: u32,
  pub question: String,
  pub options: Vec<McqOption>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortAnswerQuestion {
  pub number: u32,
  pub question: String,
}

/// Display half of a quiz. Carries no correct answers.
///
/// Question and answer sets serialize camelCase like the rest of the artifact;
/// snake_case aliases keep older stored rows readable.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSet {
  #[serde(alias = "multiple_choice")] pub multiple_choice: Vec<McqQuestion>,
  #[serde(alias = "short_answer")] pub short_answer: Vec<ShortAnswerQuestion>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Explanation {
  pub number: u32,
  #[serde(alias = "correct_answer")] pub correct_answer: String,
  pub explanation: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShortAnswerKey {
  pub number: u32,
  #[serde(alias = "model_answer")] pub model_answer: String,
}

/// Grading half of a quiz, aligned with `QuestionSet` by number.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSet {
  #[serde(alias = "multiple_choice")] pub multiple_choice: Vec<Explanation>,
  #[serde(alias = "short_answer")] pub short_answer: Vec<ShortAnswerKey>,
}

impl AnswerSet {
  #[cfg(test)]
  pub fn designations(&self) -> Vec<&str> {
    self.multiple_choice.iter().map(|e| e.correct_answer.as_str()).collect()
  }
}

/// Row shape of a stored artifact (no joined owner name).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArtifactRecord {
  pub id: String,
  pub batch_id: String,
  pub input_kind: InputKind,
  pub input_id: String,
  #[serde(default)] pub student_id: Option<String>,
  pub source_name: String,
  pub questions: QuestionSet,
  pub answers: AnswerSet,
  #[serde(default)] pub quiz_document_url: Option<String>,
  #[serde(default)] pub answer_document_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Values the writer hands to the store. The store assigns `id` and timestamps.
#[derive(Clone, Debug, PartialEq)]
pub struct NewArtifact {
  pub batch_id: String,
  pub input_kind: InputKind,
  pub input_id: String,
  pub student_id: Option<String>,
  pub source_name: String,
  pub questions: QuestionSet,
  pub answers: AnswerSet,
}

/// Persisted output of generation for one (batch, input) pair, with the owner
/// display name resolved.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedArtifact {
  pub id: String,
  pub batch_id: String,
  pub input_kind: InputKind,
  pub input_id: String,
  pub student_id: Option<String>,
  pub owner_name: String,
  pub source_name: String,
  pub questions: QuestionSet,
  pub answers: AnswerSet,
  pub quiz_document_url: Option<String>,
  pub answer_document_url: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl GeneratedArtifact {
  pub fn from_record(rec: ArtifactRecord, owner_name: String) -> Self {
    Self {
      id: rec.id,
      batch_id: rec.batch_id,
      input_kind: rec.input_kind,
      input_id: rec.input_id,
      student_id: rec.student_id,
      owner_name,
      source_name: rec.source_name,
      questions: rec.questions,
      answers: rec.answers,
      quiz_document_url: rec.quiz_document_url,
      answer_document_url: rec.answer_document_url,
      created_at: rec.created_at,
      updated_at: rec.updated_at,
    }
  }
}
