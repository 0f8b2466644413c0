//! Relational store collaborator: batch configs, input lists, profile lookups and
//! artifact upserts.
//!
//! `MemoryStore` backs development and tests; `RestStore` talks to the hosted
//! PostgREST endpoint.

use async_trait::async_trait;

use crate::domain::{ArtifactRecord, BatchScope, GenerationBatch, InputMaterial, NewArtifact, Profile};
use crate::error::StoreError;

pub mod memory;
pub mod rest;

pub use memory::MemoryStore;
pub use rest::RestStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_batch(&self, batch_id: &str) -> Result<Option<GenerationBatch>, StoreError>;

    async fn insert_batch(&self, batch: GenerationBatch) -> Result<GenerationBatch, StoreError>;

    /// Student-submitted files registered for a batch, oldest first.
    async fn list_student_files(&self, batch_id: &str) -> Result<Vec<InputMaterial>, StoreError>;

    /// Shared materials in a batch's scope, oldest first.
    async fn list_shared_materials(&self, scope: &BatchScope) -> Result<Vec<InputMaterial>, StoreError>;

    async fn get_profile(&self, profile_id: &str) -> Result<Option<Profile>, StoreError>;

    /// Insert or replace the artifact for `(batch_id, input_kind, input_id)`.
    /// An existing row keeps its `id` and `created_at`.
    async fn upsert_artifact(&self, artifact: NewArtifact) -> Result<ArtifactRecord, StoreError>;

    async fn list_artifacts(&self, batch_id: &str) -> Result<Vec<ArtifactRecord>, StoreError>;
}
