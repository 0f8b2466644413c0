//! Shared fixtures and fake collaborators for unit and router tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::blob::{BlobStore, FetchedBlob, MemoryBlobStore};
use crate::domain::{
    ArtifactRecord, BatchScope, GenerationBatch, InputKind, InputMaterial, NewArtifact, Profile,
};
use crate::error::{BlobError, GeneratorError, StoreError};
use crate::pipeline::synth::{GeneratedDraft, QuestionGenerator, SynthesisRequest};
use crate::store::{MemoryStore, Store};

pub const COURSE_ID: &str = "course-1";

pub fn batch(id: &str, mcq_count: u32, short_answer_count: u32, key: Option<&[&str]>) -> GenerationBatch {
    GenerationBatch {
        id: id.to_string(),
        course_id: COURSE_ID.to_string(),
        lecture_id: None,
        mcq_count,
        short_answer_count,
        fixed_mcq_answer_key: key.map(|k| k.iter().map(|s| s.to_string()).collect()),
        created_by: Some("educator-1".into()),
        created_at: Utc::now(),
    }
}

pub fn student_file(id: &str, student_id: &str, name: &str) -> InputMaterial {
    InputMaterial {
        id: id.to_string(),
        kind: InputKind::StudentFile,
        name: name.to_string(),
        location: format!("quiz/{}/{}/{}", student_id, id, name),
        content_type: None,
        student_id: Some(student_id.to_string()),
    }
}

pub fn shared_material(id: &str, name: &str) -> InputMaterial {
    InputMaterial {
        id: id.to_string(),
        kind: InputKind::SharedMaterial,
        name: name.to_string(),
        location: format!("materials/{}/{}/{}", COURSE_ID, id, name),
        content_type: None,
        student_id: None,
    }
}

/// A blob store whose fetches never complete.
pub struct PendingBlobStore;

#[async_trait]
impl BlobStore for PendingBlobStore {
    async fn fetch(&self, _location: &str) -> Result<FetchedBlob, BlobError> {
        std::future::pending().await
    }
}

/// Wraps a `MemoryBlobStore`: every fetch takes `delay`, fetches of the listed
/// locations never complete, and the peak number of concurrent fetches is kept.
#[derive(Clone)]
pub struct GatedBlobStore {
    inner: MemoryBlobStore,
    hang: HashSet<String>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl GatedBlobStore {
    pub fn new(inner: MemoryBlobStore, delay: Duration, hang: &[&str]) -> Self {
        Self {
            inner,
            hang: hang.iter().map(|s| s.to_string()).collect(),
            delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for GatedBlobStore {
    async fn fetch(&self, location: &str) -> Result<FetchedBlob, BlobError> {
        if self.hang.contains(location) {
            return std::future::pending().await;
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.fetch(location).await
    }
}

/// Wraps a `MemoryStore`, rejecting artifact writes for the listed input ids.
pub struct FailingStore {
    inner: MemoryStore,
    fail_inputs: HashSet<String>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore, fail_inputs: &[&str]) -> Self {
        Self { inner, fail_inputs: fail_inputs.iter().map(|s| s.to_string()).collect() }
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn get_batch(&self, batch_id: &str) -> Result<Option<GenerationBatch>, StoreError> {
        self.inner.get_batch(batch_id).await
    }

    async fn insert_batch(&self, batch: GenerationBatch) -> Result<GenerationBatch, StoreError> {
        self.inner.insert_batch(batch).await
    }

    async fn list_student_files(&self, batch_id: &str) -> Result<Vec<InputMaterial>, StoreError> {
        self.inner.list_student_files(batch_id).await
    }

    async fn list_shared_materials(&self, scope: &BatchScope) -> Result<Vec<InputMaterial>, StoreError> {
        self.inner.list_shared_materials(scope).await
    }

    async fn get_profile(&self, _profile_id: &str) -> Result<Option<Profile>, StoreError> {
        Err(StoreError::Request("profiles unavailable".into()))
    }

    async fn upsert_artifact(&self, artifact: NewArtifact) -> Result<ArtifactRecord, StoreError> {
        if self.fail_inputs.contains(&artifact.input_id) {
            return Err(StoreError::HttpStatus { status: 503, message: "write rejected".into() });
        }
        self.inner.upsert_artifact(artifact).await
    }

    async fn list_artifacts(&self, batch_id: &str) -> Result<Vec<ArtifactRecord>, StoreError> {
        self.inner.list_artifacts(batch_id).await
    }
}

#[derive(Default)]
struct ScriptState {
    calls: usize,
    last_designations: Vec<String>,
}

/// Returns a fixed draft and records what it was asked for.
#[derive(Clone)]
pub struct ScriptedGenerator {
    draft: GeneratedDraft,
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedGenerator {
    pub fn new(draft: GeneratedDraft) -> Self {
        Self { draft, state: Arc::new(Mutex::new(ScriptState::default())) }
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn last_designations(&self) -> Vec<String> {
        self.state.lock().unwrap().last_designations.clone()
    }
}

#[async_trait]
impl QuestionGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, req: &SynthesisRequest<'_>) -> Result<GeneratedDraft, GeneratorError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.last_designations = req.designations.to_vec();
        Ok(self.draft.clone())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl QuestionGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _req: &SynthesisRequest<'_>) -> Result<GeneratedDraft, GeneratorError> {
        Err(GeneratorError::HttpStatus { status: 429, message: "rate limited".into() })
    }
}
