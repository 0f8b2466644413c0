//! Batch Loader: batch id → configuration + candidate inputs. No side effects.

use tracing::{debug, instrument};

use crate::domain::{GenerationBatch, InputMaterial};
use crate::error::GenerationError;
use crate::store::Store;

#[derive(Clone, Debug)]
pub struct LoadedBatch {
    pub batch: GenerationBatch,
    pub student_inputs: Vec<InputMaterial>,
    pub shared_inputs: Vec<InputMaterial>,
}

#[instrument(level = "info", skip(store))]
pub async fn load_batch(store: &dyn Store, batch_id: &str) -> Result<LoadedBatch, GenerationError> {
    let batch = store
        .get_batch(batch_id)
        .await?
        .ok_or_else(|| GenerationError::NotFound(format!("Quiz batch not found: {}", batch_id)))?;

    let scope = batch.scope();
    let (student_inputs, shared_inputs) = tokio::try_join!(
        store.list_student_files(&batch.id),
        store.list_shared_materials(&scope),
    )?;

    debug!(
        target: "pipeline",
        %batch_id,
        students = student_inputs.len(),
        shared = shared_inputs.len(),
        "Batch loaded"
    );
    Ok(LoadedBatch { batch, student_inputs, shared_inputs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testkit;

    #[tokio::test]
    async fn unknown_batch_is_not_found() {
        let store = MemoryStore::new();
        let err = load_batch(&store, "nope").await.unwrap_err();
        assert!(matches!(err, GenerationError::NotFound(_)));
    }

    #[tokio::test]
    async fn both_input_sets_are_returned() {
        let store = MemoryStore::new();
        store.add_batch(testkit::batch("b1", 2, 0, None)).await;
        store.add_student_file("b1", testkit::student_file("f1", "s1", "a.txt")).await;
        store.add_student_file("other", testkit::student_file("f2", "s2", "b.txt")).await;
        store
            .add_shared_material("course-1", None, testkit::shared_material("m1", "syllabus.txt"))
            .await;

        let loaded = load_batch(&store, "b1").await.unwrap();
        assert_eq!(loaded.batch.mcq_count, 2);
        assert_eq!(loaded.student_inputs.len(), 1);
        assert_eq!(loaded.student_inputs[0].id, "f1");
        assert_eq!(loaded.shared_inputs.len(), 1);
    }
}
