//! Quiz-batch generation pipeline.
//!
//! Loader → (fan-out per input) → Resolver → Synthesizer → Writer → report.
//!
//! Each selected input moves through `Loaded → Resolving → Synthesizing →
//! Persisted` on its own, or drops to `Skipped` with an `InputFailure`. A batch
//! is complete once every selected input has been attempted; one input's failure
//! never blocks the others. Only pre-flight problems (blank id, unknown batch,
//! store unavailable while loading) fail the run.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::blob::BlobStore;
use crate::config::Settings;
use crate::domain::{GeneratedArtifact, GenerationBatch, InputMaterial};
use crate::error::{GenerationError, InputFailure};
use crate::store::Store;

pub mod loader;
pub mod resolver;
pub mod synth;
pub mod writer;

use loader::LoadedBatch;
use resolver::{ContentResolver, Resolution};
use synth::{QuestionGenerator, Synthesizer};
use writer::PersistenceWriter;

/// Which inputs a batch run selected.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Every student file; shared materials ignored.
    Student,
    /// First usable shared material only.
    Shared,
    /// No inputs of either kind.
    Empty,
}

#[derive(Clone, Copy, Debug)]
enum InputStage {
    Loaded,
    Resolving,
    Synthesizing,
    Persisted,
    Skipped,
}

fn transition(input: &InputMaterial, stage: InputStage) {
    debug!(target: "pipeline", input = %input.key(), ?stage, "Input stage");
}

#[derive(Debug)]
pub struct RunReport {
    pub batch_id: String,
    pub mode: GenerationMode,
    /// Successful artifacts, in input order.
    pub artifacts: Vec<GeneratedArtifact>,
    pub skipped: Vec<InputFailure>,
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    resolver: ContentResolver,
    synthesizer: Synthesizer,
    writer: PersistenceWriter,
    max_concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        blobs: Arc<dyn BlobStore>,
        generator: Option<Arc<dyn QuestionGenerator>>,
        settings: &Settings,
    ) -> Self {
        Self {
            resolver: ContentResolver::new(blobs, Duration::from_secs(settings.fetch_timeout_secs)),
            synthesizer: Synthesizer::new(generator).with_max_per_kind(settings.max_questions_per_kind),
            writer: PersistenceWriter::new(store.clone(), settings),
            store,
            max_concurrency: settings.max_concurrency.max(1),
        }
    }

    #[instrument(level = "info", skip(self))]
    pub async fn run(&self, batch_id: &str) -> Result<RunReport, GenerationError> {
        let batch_id = batch_id.trim();
        if batch_id.is_empty() {
            return Err(GenerationError::Validation("Batch ID is required".into()));
        }

        let LoadedBatch { batch, student_inputs, shared_inputs } =
            loader::load_batch(self.store.as_ref(), batch_id).await?;

        let (mode, results) = if !student_inputs.is_empty() {
            if !shared_inputs.is_empty() {
                debug!(target: "pipeline", ignored = shared_inputs.len(), "Student mode: ignoring shared materials");
            }
            (GenerationMode::Student, self.run_student_mode(&batch, &student_inputs).await)
        } else if !shared_inputs.is_empty() {
            (GenerationMode::Shared, self.run_shared_mode(&batch, &shared_inputs).await)
        } else {
            info!(target: "pipeline", %batch_id, "No student files or shared materials; nothing to generate");
            (GenerationMode::Empty, Vec::new())
        };

        let mut artifacts = Vec::new();
        let mut skipped = Vec::new();
        for result in results {
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(failure) => skipped.push(failure),
            }
        }

        info!(
            target: "pipeline",
            %batch_id,
            ?mode,
            generated = artifacts.len(),
            skipped = skipped.len(),
            "Batch run completed"
        );
        Ok(RunReport { batch_id: batch.id, mode, artifacts, skipped })
    }

    /// Fan out over all student files with bounded concurrency. One slot per
    /// input, merged in input order once all are done.
    async fn run_student_mode(
        &self,
        batch: &GenerationBatch,
        inputs: &[InputMaterial],
    ) -> Vec<Result<GeneratedArtifact, InputFailure>> {
        // Futures are built up front so the stream's item type carries no
        // higher-ranked closure lifetimes; handler futures must stay `Send`.
        let pending: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(idx, input)| async move { (idx, self.process_input(batch, input).await) })
            .collect();
        let mut slots: Vec<(usize, Result<GeneratedArtifact, InputFailure>)> = stream::iter(pending)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        slots.sort_by_key(|(idx, _)| *idx);
        slots.into_iter().map(|(_, r)| r).collect()
    }

    /// Try shared materials in order; only the first usable one is synthesized.
    async fn run_shared_mode(
        &self,
        batch: &GenerationBatch,
        inputs: &[InputMaterial],
    ) -> Vec<Result<GeneratedArtifact, InputFailure>> {
        let mut results = Vec::new();
        for input in inputs {
            transition(input, InputStage::Loaded);
            match self.resolve(input).await {
                Ok(resolution) => {
                    results.push(self.synthesize_and_write(batch, input, &resolution).await);
                    return results;
                }
                Err(failure) => results.push(Err(failure)),
            }
        }
        warn!(target: "pipeline", batch_id = %batch.id, tried = inputs.len(), "No shared material could be resolved");
        results
    }

    async fn process_input(
        &self,
        batch: &GenerationBatch,
        input: &InputMaterial,
    ) -> Result<GeneratedArtifact, InputFailure> {
        transition(input, InputStage::Loaded);
        let resolution = self.resolve(input).await?;
        self.synthesize_and_write(batch, input, &resolution).await
    }

    async fn resolve(&self, input: &InputMaterial) -> Result<Resolution, InputFailure> {
        transition(input, InputStage::Resolving);
        let resolution = self.resolver.resolve(input).await;
        if resolution.is_usable() {
            debug!(target: "pipeline", input = %input.key(), resolution = resolution.label(), "Content resolved");
            Ok(resolution)
        } else {
            let failure = InputFailure::PartialResolution { input: input.key(), reason: resolution.reason() };
            warn!(target: "pipeline", error = %failure, "Skipping input");
            transition(input, InputStage::Skipped);
            Err(failure)
        }
    }

    async fn synthesize_and_write(
        &self,
        batch: &GenerationBatch,
        input: &InputMaterial,
        resolution: &Resolution,
    ) -> Result<GeneratedArtifact, InputFailure> {
        transition(input, InputStage::Synthesizing);
        let synthesized = self.synthesizer.synthesize(&input.name, resolution.text(), batch).await;
        match self.writer.write(batch, input, synthesized).await {
            Ok(artifact) => {
                transition(input, InputStage::Persisted);
                Ok(artifact)
            }
            Err(failure) => {
                error!(target: "pipeline", error = %failure, "Skipping input");
                transition(input, InputStage::Skipped);
                Err(failure)
            }
        }
    }

    /// Stored artifacts for a batch with owner names resolved.
    #[instrument(level = "info", skip(self))]
    pub async fn list_artifacts(&self, batch_id: &str) -> Result<Vec<GeneratedArtifact>, GenerationError> {
        if self.store.get_batch(batch_id).await?.is_none() {
            return Err(GenerationError::NotFound(format!("Quiz batch not found: {}", batch_id)));
        }
        let records = self.store.list_artifacts(batch_id).await?;
        Ok(futures::future::join_all(records.into_iter().map(|r| self.writer.with_owner_name(r))).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::MemoryBlobStore;
    use crate::domain::{InputKind, Profile};
    use crate::store::MemoryStore;
    use crate::testkit::{self, FailingStore, GatedBlobStore};

    struct Fixture {
        store: MemoryStore,
        blobs: MemoryBlobStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self { store: MemoryStore::new(), blobs: MemoryBlobStore::new() }
        }

        async fn student(&self, batch_id: &str, id: &str, student: &str, name: &str, body: Option<&str>) {
            let input = testkit::student_file(id, student, name);
            if let Some(body) = body {
                self.blobs.put(&input.location, body.as_bytes().to_vec(), None).await;
            }
            self.store.add_student_file(batch_id, input).await;
        }

        async fn shared(&self, id: &str, name: &str, body: Option<&str>) {
            let input = testkit::shared_material(id, name);
            if let Some(body) = body {
                self.blobs.put(&input.location, body.as_bytes().to_vec(), None).await;
            }
            self.store.add_shared_material(testkit::COURSE_ID, None, input).await;
        }

        fn orchestrator(&self) -> Orchestrator {
            Orchestrator::new(
                Arc::new(self.store.clone()),
                Arc::new(self.blobs.clone()),
                None,
                &Settings::default(),
            )
        }
    }

    #[tokio::test]
    async fn blank_and_unknown_ids_fail_preflight() {
        let fx = Fixture::new();
        let orch = fx.orchestrator();
        assert!(matches!(orch.run("  ").await, Err(GenerationError::Validation(_))));
        assert!(matches!(orch.run("missing").await, Err(GenerationError::NotFound(_))));
    }

    #[tokio::test]
    async fn fixed_key_applies_to_every_student() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 3, 1, Some(&["B", "A", "C", "D"]))).await;
        for (i, body) in ["alpha", "beta\ngamma", "delta"].iter().enumerate() {
            let id = format!("f{}", i);
            let student = format!("s{}", i);
            fx.student("b1", &id, &student, &format!("notes{}.txt", i), Some(*body)).await;
        }
        fx.shared("m1", "syllabus.txt", Some("ignored")).await;

        let report = fx.orchestrator().run("b1").await.unwrap();
        assert_eq!(report.mode, GenerationMode::Student);
        assert_eq!(report.artifacts.len(), 3);
        assert!(report.skipped.is_empty());
        for artifact in &report.artifacts {
            assert_eq!(artifact.input_kind, InputKind::StudentFile);
            assert_eq!(artifact.answers.designations(), vec!["B", "A", "C"]);
        }
        let ids: Vec<&str> = report.artifacts.iter().map(|a| a.input_id.as_str()).collect();
        assert_eq!(ids, vec!["f0", "f1", "f2"]);
    }

    #[tokio::test]
    async fn scenario_three_questions_from_notes() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 3, 0, Some(&["B", "A", "C"]))).await;
        fx.store.add_profile(Profile { id: "s1".into(), full_name: Some("Ada Lovelace".into()) }).await;
        fx.student("b1", "f1", "s1", "notes.txt", Some("Engines compute.")).await;

        let report = fx.orchestrator().run("b1").await.unwrap();
        assert_eq!(report.artifacts.len(), 1);
        let art = &report.artifacts[0];
        assert_eq!(art.owner_name, "Ada Lovelace");
        let numbers: Vec<u32> = art.questions.multiple_choice.iter().map(|q| q.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(art.answers.designations(), vec!["B", "A", "C"]);
    }

    #[tokio::test]
    async fn shared_mode_uses_first_resolvable_material_only() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 2, 0, None)).await;
        fx.shared("m0", "diagram.png", None).await;
        fx.shared("m1", "syllabus.txt", Some("Week 1: intro")).await;
        fx.shared("m2", "week2.txt", Some("Week 2: more")).await;

        let report = fx.orchestrator().run("b1").await.unwrap();
        assert_eq!(report.mode, GenerationMode::Shared);
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].input_id, "m1");
        assert_eq!(report.artifacts[0].owner_name, "Course Material");
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(fx.store.artifact_count().await, 1);
    }

    #[tokio::test]
    async fn empty_batch_completes_with_no_artifacts() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 5, 5, None)).await;
        let report = fx.orchestrator().run("b1").await.unwrap();
        assert_eq!(report.mode, GenerationMode::Empty);
        assert!(report.artifacts.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn rerun_upserts_instead_of_duplicating() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 1, 0, None)).await;
        fx.student("b1", "f1", "s1", "a.txt", Some("a")).await;
        fx.student("b1", "f2", "s2", "b.txt", Some("b")).await;
        let orch = fx.orchestrator();

        let first = orch.run("b1").await.unwrap();
        let second = orch.run("b1").await.unwrap();
        assert_eq!(fx.store.artifact_count().await, 2);
        let ids = |r: &RunReport| r.artifacts.iter().map(|a| a.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[tokio::test]
    async fn unreachable_input_is_isolated() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 2, 0, None)).await;
        fx.student("b1", "f1", "s1", "a.txt", Some("a")).await;
        fx.student("b1", "f2", "s2", "gone.txt", None).await;
        fx.student("b1", "f3", "s3", "c.pdf", Some("%PDF")).await;

        let report = fx.orchestrator().run("b1").await.unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(&report.skipped[0], InputFailure::PartialResolution { input, .. } if input.id == "f2"));
    }

    #[tokio::test]
    async fn persistence_failure_is_isolated() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 1, 0, None)).await;
        fx.student("b1", "f1", "s1", "a.txt", Some("a")).await;
        fx.student("b1", "f2", "s2", "b.txt", Some("b")).await;

        let orch = Orchestrator::new(
            Arc::new(FailingStore::new(fx.store.clone(), &["f1"])),
            Arc::new(fx.blobs.clone()),
            None,
            &Settings { max_concurrency: 1, ..Settings::default() },
        );
        let report = orch.run("b1").await.unwrap();
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].input_id, "f2");
        assert!(matches!(report.skipped[0], InputFailure::Persistence { .. }));
    }

    #[tokio::test]
    async fn list_artifacts_requires_known_batch() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 1, 0, None)).await;
        fx.student("b1", "f1", "s1", "a.txt", Some("a")).await;
        let orch = fx.orchestrator();
        orch.run("b1").await.unwrap();

        let listed = orch.list_artifacts("b1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].owner_name, "Unknown Student");
        assert!(matches!(orch.list_artifacts("nope").await, Err(GenerationError::NotFound(_))));
    }

    #[tokio::test]
    async fn fan_out_respects_max_concurrency() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 1, 0, None)).await;
        for i in 0..8 {
            fx.student("b1", &format!("f{}", i), &format!("s{}", i), "notes.txt", Some("text")).await;
        }
        let blobs = GatedBlobStore::new(fx.blobs.clone(), Duration::from_millis(30), &[]);
        let orch = Orchestrator::new(
            Arc::new(fx.store.clone()),
            Arc::new(blobs.clone()),
            None,
            &Settings { max_concurrency: 3, ..Settings::default() },
        );

        let report = orch.run("b1").await.unwrap();
        assert_eq!(report.artifacts.len(), 8);
        assert!(blobs.peak() <= 3, "peak {}", blobs.peak());
        assert!(blobs.peak() >= 2, "fetches never overlapped");
    }

    #[tokio::test]
    async fn hanging_fetch_does_not_block_other_inputs() {
        let fx = Fixture::new();
        fx.store.add_batch(testkit::batch("b1", 1, 0, None)).await;
        for i in 0..4 {
            fx.student("b1", &format!("f{}", i), &format!("s{}", i), "notes.txt", Some("text")).await;
        }
        let stuck = testkit::student_file("f1", "s1", "notes.txt").location;
        let blobs = GatedBlobStore::new(fx.blobs.clone(), Duration::from_millis(1), &[stuck.as_str()]);
        let orch = Orchestrator::new(
            Arc::new(fx.store.clone()),
            Arc::new(blobs),
            None,
            &Settings { max_concurrency: 2, fetch_timeout_secs: 1, ..Settings::default() },
        );

        let report = tokio::time::timeout(Duration::from_secs(10), orch.run("b1"))
            .await
            .expect("batch run finished")
            .unwrap();
        let ids: Vec<&str> = report.artifacts.iter().map(|a| a.input_id.as_str()).collect();
        assert_eq!(ids, vec!["f0", "f2", "f3"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(&report.skipped[0], InputFailure::PartialResolution { input, .. } if input.id == "f1"));
    }
}
