//! In-process store guarded by `tokio::sync::RwLock`, one lock per table.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{
    ArtifactRecord, BatchScope, GenerationBatch, InputKey, InputMaterial, NewArtifact, Profile,
};
use crate::error::StoreError;
use crate::store::Store;

#[derive(Clone)]
struct SharedRow {
    course_id: String,
    lecture_id: Option<String>,
    material: InputMaterial,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    batches: Arc<RwLock<HashMap<String, GenerationBatch>>>,
    student_files: Arc<RwLock<Vec<(String, InputMaterial)>>>,
    shared: Arc<RwLock<Vec<SharedRow>>>,
    profiles: Arc<RwLock<HashMap<String, Profile>>>,
    artifacts: Arc<RwLock<BTreeMap<(String, InputKey), ArtifactRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_batch(&self, batch: GenerationBatch) {
        self.batches.write().await.insert(batch.id.clone(), batch);
    }

    pub async fn add_student_file(&self, batch_id: &str, material: InputMaterial) {
        self.student_files
            .write()
            .await
            .push((batch_id.to_string(), material));
    }

    pub async fn add_shared_material(
        &self,
        course_id: &str,
        lecture_id: Option<&str>,
        material: InputMaterial,
    ) {
        self.shared.write().await.push(SharedRow {
            course_id: course_id.to_string(),
            lecture_id: lecture_id.map(str::to_string),
            material,
        });
    }

    pub async fn add_profile(&self, profile: Profile) {
        self.profiles.write().await.insert(profile.id.clone(), profile);
    }

    #[cfg(test)]
    pub async fn artifact_count(&self) -> usize {
        self.artifacts.read().await.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_batch(&self, batch_id: &str) -> Result<Option<GenerationBatch>, StoreError> {
        Ok(self.batches.read().await.get(batch_id).cloned())
    }

    async fn insert_batch(&self, batch: GenerationBatch) -> Result<GenerationBatch, StoreError> {
        let mut batches = self.batches.write().await;
        if batches.contains_key(&batch.id) {
            return Err(StoreError::Rejected(format!("batch {} already exists", batch.id)));
        }
        batches.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    async fn list_student_files(&self, batch_id: &str) -> Result<Vec<InputMaterial>, StoreError> {
        let files = self.student_files.read().await;
        Ok(files
            .iter()
            .filter(|(b, _)| b == batch_id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn list_shared_materials(&self, scope: &BatchScope) -> Result<Vec<InputMaterial>, StoreError> {
        let shared = self.shared.read().await;
        Ok(shared
            .iter()
            .filter(|row| match scope {
                BatchScope::Course { course_id } => &row.course_id == course_id,
                BatchScope::Lecture { course_id, lecture_id } => {
                    &row.course_id == course_id && row.lecture_id.as_ref() == Some(lecture_id)
                }
            })
            .map(|row| row.material.clone())
            .collect())
    }

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.read().await.get(profile_id).cloned())
    }

    #[instrument(level = "debug", skip(self, artifact), fields(batch_id = %artifact.batch_id, input_id = %artifact.input_id))]
    async fn upsert_artifact(&self, artifact: NewArtifact) -> Result<ArtifactRecord, StoreError> {
        let key = (
            artifact.batch_id.clone(),
            InputKey { kind: artifact.input_kind, id: artifact.input_id.clone() },
        );
        let now = Utc::now();

        let mut artifacts = self.artifacts.write().await;
        let (id, created_at) = match artifacts.get(&key) {
            Some(existing) => {
                debug!(target: "pipeline", id = %existing.id, "Replacing existing artifact");
                (existing.id.clone(), existing.created_at)
            }
            None => (Uuid::new_v4().to_string(), now),
        };

        let record = ArtifactRecord {
            id,
            batch_id: artifact.batch_id,
            input_kind: artifact.input_kind,
            input_id: artifact.input_id,
            student_id: artifact.student_id,
            source_name: artifact.source_name,
            questions: artifact.questions,
            answers: artifact.answers,
            quiz_document_url: None,
            answer_document_url: None,
            created_at,
            updated_at: now,
        };
        artifacts.insert(key, record.clone());
        Ok(record)
    }

    async fn list_artifacts(&self, batch_id: &str) -> Result<Vec<ArtifactRecord>, StoreError> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts
            .iter()
            .filter(|((b, _), _)| b == batch_id)
            .map(|(_, rec)| rec.clone())
            .collect())
    }
}
