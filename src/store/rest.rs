//! PostgREST client for the hosted relational store.
//!
//! Every call is a simple filtered query against one table. Upserts rely on the
//! unique `(batch_id, input_kind, input_id)` constraint of `generated_quizzes`
//! together with `Prefer: resolution=merge-duplicates`.
//!
//! NOTE: the service key is never logged.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{
  AnswerSet, ArtifactRecord, BatchScope, GenerationBatch, InputKind, InputMaterial, NewArtifact, Profile,
  QuestionSet,
};
use crate::error::StoreError;
use crate::store::Store;

const BATCHES: &str = "quiz_batches";
const STUDENT_FILES: &str = "student_quiz_files";
const MATERIALS: &str = "course_materials";
const PROFILES: &str = "profiles";
const ARTIFACTS: &str = "generated_quizzes";
const ARTIFACT_CONFLICT: &str = "batch_id,input_kind,input_id";

#[derive(Clone)]
pub struct RestStore {
  client: reqwest::Client,
  rest_url: String,
  service_key: String,
}

#[derive(Deserialize)]
struct StudentFileRow {
  id: String,
  #[serde(default)] student_id: Option<String>,
  file_name: String,
  file_path: String,
  #[serde(default)] content_type: Option<String>,
}

impl From<StudentFileRow> for InputMaterial {
  fn from(r: StudentFileRow) -> Self {
    InputMaterial {
      id: r.id,
      kind: InputKind::StudentFile,
      name: r.file_name,
      location: r.file_path,
      content_type: r.content_type,
      student_id: r.student_id,
    }
  }
}

#[derive(Deserialize)]
struct MaterialRow {
  id: String,
  #[serde(default)] title: Option<String>,
  file_name: String,
  file_path: String,
  #[serde(default)] content_type: Option<String>,
}

impl From<MaterialRow> for InputMaterial {
  fn from(r: MaterialRow) -> Self {
    InputMaterial {
      id: r.id,
      kind: InputKind::SharedMaterial,
      name: r.title.filter(|t| !t.trim().is_empty()).unwrap_or(r.file_name),
      location: r.file_path,
      content_type: r.content_type,
      student_id: None,
    }
  }
}

/// Body of an artifact upsert. `id` and `created_at` are left to the database so
/// an existing row keeps them; the document URLs are reset explicitly.
#[derive(Serialize)]
struct ArtifactUpsertRow<'a> {
  batch_id: &'a str,
  input_kind: InputKind,
  input_id: &'a str,
  student_id: Option<&'a str>,
  source_name: &'a str,
  questions: &'a QuestionSet,
  answers: &'a AnswerSet,
  quiz_document_url: Option<String>,
  answer_document_url: Option<String>,
  updated_at: DateTime<Utc>,
}

impl RestStore {
  /// `project_url` is the backend-as-a-service base, e.g. `https://xyz.supabase.co`.
  pub fn new(project_url: &str, service_key: String) -> Result<Self, StoreError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| StoreError::Request(e.to_string()))?;
    Ok(Self {
      client,
      rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
      service_key,
    })
  }

  fn table_url(&self, table: &str) -> String {
    format!("{}/{}", self.rest_url, table)
  }

  fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
    self.client.request(method, self.table_url(table))
      .header(USER_AGENT, "quizgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("apikey", &self.service_key)
      .header(AUTHORIZATION, format!("Bearer {}", self.service_key))
  }

  #[instrument(level = "debug", skip(self, query))]
  async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>, StoreError> {
    let res = self.request(reqwest::Method::GET, table)
      .query(query)
      .send().await.map_err(|e| StoreError::Request(e.to_string()))?;
    decode_rows(res).await
  }

  async fn insert_returning<B: Serialize + ?Sized, T: DeserializeOwned>(
    &self,
    table: &str,
    query: &[(&str, String)],
    prefer: &str,
    body: &B,
  ) -> Result<T, StoreError> {
    let res = self.request(reqwest::Method::POST, table)
      .query(query)
      .header("Prefer", prefer)
      .json(body)
      .send().await.map_err(|e| StoreError::Request(e.to_string()))?;
    let mut rows: Vec<T> = decode_rows(res).await?;
    if rows.is_empty() {
      return Err(StoreError::Decode(format!("{} returned no representation", table)));
    }
    Ok(rows.swap_remove(0))
  }
}

async fn decode_rows<T: DeserializeOwned>(res: reqwest::Response) -> Result<Vec<T>, StoreError> {
  if !res.status().is_success() {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    let message = extract_postgrest_error(&body).unwrap_or(body);
    return Err(StoreError::HttpStatus { status, message });
  }
  res.json::<Vec<T>>().await.map_err(|e| StoreError::Decode(e.to_string()))
}

fn eq(v: &str) -> String {
  format!("eq.{}", v)
}

fn scope_filters(scope: &BatchScope) -> Vec<(&'static str, String)> {
  let mut q = vec![("course_id", eq(scope.course_id()))];
  if let BatchScope::Lecture { lecture_id, .. } = scope {
    q.push(("lecture_id", eq(lecture_id)));
  }
  q
}

#[async_trait]
impl Store for RestStore {
  async fn get_batch(&self, batch_id: &str) -> Result<Option<GenerationBatch>, StoreError> {
    let mut rows: Vec<GenerationBatch> = self
      .select(BATCHES, &[("id", eq(batch_id)), ("select", "*".into()), ("limit", "1".into())])
      .await?;
    Ok(rows.pop())
  }

  async fn insert_batch(&self, batch: GenerationBatch) -> Result<GenerationBatch, StoreError> {
    self.insert_returning(BATCHES, &[], "return=representation", &batch).await
  }

  async fn list_student_files(&self, batch_id: &str) -> Result<Vec<InputMaterial>, StoreError> {
    let rows: Vec<StudentFileRow> = self
      .select(STUDENT_FILES, &[("batch_id", eq(batch_id)), ("order", "created_at.asc".into())])
      .await?;
    debug!(target: "quizgen", %batch_id, count = rows.len(), "Fetched student files");
    Ok(rows.into_iter().map(InputMaterial::from).collect())
  }

  async fn list_shared_materials(&self, scope: &BatchScope) -> Result<Vec<InputMaterial>, StoreError> {
    let mut q = scope_filters(scope);
    q.push(("order", "created_at.asc".into()));
    let rows: Vec<MaterialRow> = self.select(MATERIALS, &q).await?;
    Ok(rows.into_iter().map(InputMaterial::from).collect())
  }

  async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, StoreError> {
    let mut rows: Vec<Profile> = self
      .select(PROFILES, &[("id", eq(profile_id)), ("select", "id,full_name".into()), ("limit", "1".into())])
      .await?;
    Ok(rows.pop())
  }

  #[instrument(level = "debug", skip(self, artifact), fields(batch_id = %artifact.batch_id, input_id = %artifact.input_id))]
  async fn upsert_artifact(&self, artifact: NewArtifact) -> Result<ArtifactRecord, StoreError> {
    let row = ArtifactUpsertRow {
      batch_id: &artifact.batch_id,
      input_kind: artifact.input_kind,
      input_id: &artifact.input_id,
      student_id: artifact.student_id.as_deref(),
      source_name: &artifact.source_name,
      questions: &artifact.questions,
      answers: &artifact.answers,
      quiz_document_url: None,
      answer_document_url: None,
      updated_at: Utc::now(),
    };
    self.insert_returning(
      ARTIFACTS,
      &[("on_conflict", ARTIFACT_CONFLICT.to_string())],
      "resolution=merge-duplicates,return=representation",
      &[row],
    ).await
  }

  async fn list_artifacts(&self, batch_id: &str) -> Result<Vec<ArtifactRecord>, StoreError> {
    self.select(ARTIFACTS, &[("batch_id", eq(batch_id)), ("order", "created_at.asc".into())]).await
  }
}

/// Try to extract a clean error message from a PostgREST error body.
fn extract_postgrest_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EObj>(body).ok().map(|e| e.message)
}
