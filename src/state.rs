//! Application state: store and blob clients, the optional question generator,
//! settings, and the orchestrator built from them.
//!
//! With SUPABASE_URL + SUPABASE_SERVICE_KEY set, the hosted REST store and HTTP
//! blob store are used. Otherwise everything runs in memory, seeded from the
//! config's fixture tables.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::blob::{BlobStore, HttpBlobStore, MemoryBlobStore};
use crate::config::{load_config_from_env, AppConfig, Settings};
use crate::domain::{InputKind, InputMaterial};
use crate::openai::OpenAI;
use crate::pipeline::synth::QuestionGenerator;
use crate::pipeline::Orchestrator;
use crate::store::{MemoryStore, RestStore, Store};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub settings: Settings,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        generator: Option<Arc<dyn QuestionGenerator>>,
        settings: Settings,
    ) -> Self {
        let orchestrator = Orchestrator::new(store.clone(), blobs, generator, &settings);
        Self { store, settings, orchestrator }
    }

    /// Build state from env: load config, pick store backends, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub async fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let cfg = load_config_from_env().unwrap_or_default();

        let generator: Option<Arc<dyn QuestionGenerator>> = match OpenAI::from_env(cfg.prompts.clone()) {
            Some(oa) => {
                info!(target: "quizgen", base_url = %oa.base_url, model = %oa.model, "OpenAI enabled.");
                Some(Arc::new(oa))
            }
            None => {
                info!(target: "quizgen", "OpenAI disabled (no OPENAI_API_KEY). Using template synthesis.");
                None
            }
        };

        let project_url = std::env::var("SUPABASE_URL").ok().filter(|u| !u.trim().is_empty());
        let service_key = std::env::var("SUPABASE_SERVICE_KEY").ok().filter(|k| !k.trim().is_empty());
        let bucket = std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "uploads".into());

        let (store, blobs): (Arc<dyn Store>, Arc<dyn BlobStore>) = match (project_url, service_key) {
            (Some(url), Some(key)) => {
                info!(target: "quizgen", %url, %bucket, "Using hosted REST store and blob storage.");
                if !cfg.batches.is_empty() {
                    warn!(target: "quizgen", "Config fixtures are ignored with a hosted store.");
                }
                (
                    Arc::new(RestStore::new(&url, key.clone())?),
                    Arc::new(HttpBlobStore::new(Some(&url), &bucket, Some(key))?),
                )
            }
            _ => {
                let (store, blobs) = seed_memory(&cfg).await;
                info!(target: "quizgen", batches = cfg.batches.len(), "Using in-memory store (no SUPABASE_URL/SUPABASE_SERVICE_KEY).");
                (Arc::new(store), Arc::new(blobs))
            }
        };

        info!(
            target: "quizgen",
            max_concurrency = cfg.settings.max_concurrency,
            fetch_timeout_secs = cfg.settings.fetch_timeout_secs,
            "Pipeline settings"
        );
        Ok(Self::new(store, blobs, generator, cfg.settings))
    }
}

/// Memory store + blob store populated from the config fixture tables.
pub async fn seed_memory(cfg: &AppConfig) -> (MemoryStore, MemoryBlobStore) {
    let store = MemoryStore::new();
    let blobs = MemoryBlobStore::new();

    for batch in &cfg.batches {
        store.add_batch(batch.clone()).await;
    }
    for profile in &cfg.profiles {
        store.add_profile(profile.clone()).await;
    }

    for f in &cfg.student_files {
        let Some(batch_id) = f.batch_id.as_deref() else {
            warn!(target: "quizgen", id = %f.id, "Skipping student file fixture: missing batch_id.");
            continue;
        };
        let location = f.location_or_default("memory://student_file");
        if let Some(content) = &f.content {
            blobs.put(location.clone(), content.as_bytes().to_vec(), f.content_type.clone()).await;
        }
        let input = InputMaterial {
            id: f.id.clone(),
            kind: InputKind::StudentFile,
            name: f.name.clone(),
            location,
            content_type: f.content_type.clone(),
            student_id: f.student_id.clone(),
        };
        store.add_student_file(batch_id, input).await;
    }

    for f in &cfg.materials {
        let Some(course_id) = f.course_id.as_deref() else {
            warn!(target: "quizgen", id = %f.id, "Skipping material fixture: missing course_id.");
            continue;
        };
        let location = f.location_or_default("memory://shared_material");
        if let Some(content) = &f.content {
            blobs.put(location.clone(), content.as_bytes().to_vec(), f.content_type.clone()).await;
        }
        let input = InputMaterial {
            id: f.id.clone(),
            kind: InputKind::SharedMaterial,
            name: f.name.clone(),
            location,
            content_type: f.content_type.clone(),
            student_id: None,
        };
        store.add_shared_material(course_id, f.lecture_id.as_deref(), input).await;
    }

    (store, blobs)
}
