//! Persistence Writer: one upserted artifact per (batch, input), returned with
//! the owner's display name resolved best-effort.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::Settings;
use crate::domain::{ArtifactRecord, GeneratedArtifact, GenerationBatch, InputKind, InputMaterial, NewArtifact};
use crate::error::InputFailure;
use crate::pipeline::synth::Synthesized;
use crate::store::Store;

pub struct PersistenceWriter {
    store: Arc<dyn Store>,
    shared_owner_label: String,
    unknown_owner_label: String,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn Store>, settings: &Settings) -> Self {
        Self {
            store,
            shared_owner_label: settings.shared_owner_label.clone(),
            unknown_owner_label: settings.unknown_owner_label.clone(),
        }
    }

    #[instrument(level = "info", skip_all, fields(batch_id = %batch.id, input = %input.key()))]
    pub async fn write(
        &self,
        batch: &GenerationBatch,
        input: &InputMaterial,
        synthesized: Synthesized,
    ) -> Result<GeneratedArtifact, InputFailure> {
        let new = NewArtifact {
            batch_id: batch.id.clone(),
            input_kind: input.kind,
            input_id: input.id.clone(),
            student_id: match input.kind {
                InputKind::StudentFile => input.student_id.clone(),
                InputKind::SharedMaterial => None,
            },
            source_name: input.name.clone(),
            questions: synthesized.questions,
            answers: synthesized.answers,
        };

        let record = self.store.upsert_artifact(new).await.map_err(|e| InputFailure::Persistence {
            input: input.key(),
            reason: e.to_string(),
        })?;
        info!(target: "pipeline", artifact_id = %record.id, "Artifact persisted");
        Ok(self.with_owner_name(record).await)
    }

    /// Attach the owner display name. Never fails: a missing or unreadable
    /// profile yields the fallback label.
    pub async fn with_owner_name(&self, record: ArtifactRecord) -> GeneratedArtifact {
        let owner = match (record.input_kind, record.student_id.as_deref()) {
            (InputKind::SharedMaterial, _) => self.shared_owner_label.clone(),
            (InputKind::StudentFile, None) => self.unknown_owner_label.clone(),
            (InputKind::StudentFile, Some(student_id)) => match self.store.get_profile(student_id).await {
                Ok(Some(profile)) => profile
                    .full_name
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| self.unknown_owner_label.clone()),
                Ok(None) => self.unknown_owner_label.clone(),
                Err(e) => {
                    warn!(target: "pipeline", %student_id, error = %e, "Profile lookup failed; using fallback owner label");
                    self.unknown_owner_label.clone()
                }
            },
        };
        GeneratedArtifact::from_record(record, owner)
    }
}
