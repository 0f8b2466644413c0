//! Loading service configuration (settings, prompts, optional fixtures) from TOML.
//!
//! See `AppConfig`, `Settings` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{GenerationBatch, Profile};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub settings: Settings,
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub batches: Vec<GenerationBatch>,
  #[serde(default)]
  pub student_files: Vec<FixtureFile>,
  #[serde(default)]
  pub materials: Vec<FixtureFile>,
  #[serde(default)]
  pub profiles: Vec<Profile>,
}

/// Pipeline tuning knobs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Upper bound on inputs processed at once within one batch.
  pub max_concurrency: usize,
  /// Hard deadline for a single content fetch.
  pub fetch_timeout_secs: u64,
  /// Largest accepted `mcq_count` / `short_answer_count` on batch creation.
  pub max_questions_per_kind: u32,
  /// Owner label for artifacts built from shared course material.
  pub shared_owner_label: String,
  /// Owner label when a student's profile can't be resolved.
  pub unknown_owner_label: String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      max_concurrency: 4,
      fetch_timeout_secs: 15,
      max_questions_per_kind: 50,
      shared_owner_label: "Course Material".into(),
      unknown_owner_label: "Unknown Student".into(),
    }
  }
}

/// Prompts used by the OpenAI question generator.
/// Override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub quiz_system: String,
  pub quiz_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      quiz_system: "You write quizzes for university courses from supplied course material. Respond ONLY with strict JSON.".into(),
      quiz_user_template: "Source: {source_name}\n\nMaterial:\n{content}\n\nWrite {mcq_count} multiple-choice questions and {short_answer_count} short-answer questions about this material.\nMultiple-choice questions are numbered 1..{mcq_count}; each has exactly 4 options labelled A-D. The correct option for each number MUST be: {designations}.\nShort-answer questions continue the numbering after the multiple-choice ones.\nReturn JSON {\"multiple_choice\": [{\"number\": n, \"question\": string, \"options\": [string, string, string, string], \"explanation\": string}], \"short_answer\": [{\"number\": n, \"question\": string, \"model_answer\": string}]}.".into(),
    }
  }
}

/// Input material declared inline in the config; seeds the memory store and
/// memory blob store for development.
#[derive(Clone, Debug, Deserialize)]
pub struct FixtureFile {
  pub id: String,
  pub name: String,
  #[serde(default)] pub location: Option<String>,
  #[serde(default)] pub content_type: Option<String>,
  #[serde(default)] pub content: Option<String>,
  // student_files
  #[serde(default)] pub batch_id: Option<String>,
  #[serde(default)] pub student_id: Option<String>,
  // materials
  #[serde(default)] pub course_id: Option<String>,
  #[serde(default)] pub lecture_id: Option<String>,
}

impl FixtureFile {
  /// Location the fixture is stored under; synthesized when not given.
  pub fn location_or_default(&self, prefix: &str) -> String {
    self.location.clone().unwrap_or_else(|| format!("{}/{}/{}", prefix, self.id, self.name))
  }
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Attempt to load `AppConfig` from QUIZGEN_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("QUIZGEN_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "quizgen", %path, batches = cfg.batches.len(), "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "quizgen", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "quizgen", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
