//! Question Synthesizer: builds aligned question and answer sets from resolved
//! content under a batch's counts and answer-key policy.
//!
//! Shape and determinism are owned here; prose quality is delegated to an
//! optional `QuestionGenerator`. Whatever the generator returns is normalized
//! back onto the required shape, and correct-answer designations always come
//! from the policy below, never from the generator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::domain::{
    AnswerSet, Explanation, GenerationBatch, McqOption, McqQuestion, QuestionSet, ShortAnswerKey,
    ShortAnswerQuestion, OPTION_LABELS,
};
use crate::config::Settings;
use crate::error::GeneratorError;
use crate::util::{clip, content_lines};

const DEFAULT_DESIGNATION: &str = "A";
const EXCERPT_CHARS: usize = 160;

/// What the external generator is asked for.
#[derive(Clone, Debug)]
pub struct SynthesisRequest<'a> {
    pub source_name: &'a str,
    pub content: &'a str,
    pub mcq_count: u32,
    pub short_answer_count: u32,
    /// Required correct option per MCQ position, 1-based order.
    pub designations: &'a [String],
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GeneratedDraft {
    #[serde(default)]
    pub multiple_choice: Vec<DraftMcq>,
    #[serde(default)]
    pub short_answer: Vec<DraftShortAnswer>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DraftMcq {
    pub number: u32,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DraftShortAnswer {
    pub number: u32,
    pub question: String,
    #[serde(default)]
    pub model_answer: String,
}

/// Pluggable content-generation collaborator.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, req: &SynthesisRequest<'_>) -> Result<GeneratedDraft, GeneratorError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Synthesized {
    pub questions: QuestionSet,
    pub answers: AnswerSet,
}

/// Correct-answer designation for every MCQ position.
///
/// Position `i` uses the fixed key's entry `i` when present and valid, else the
/// first option.
pub fn designations(mcq_count: u32, fixed_key: Option<&[String]>) -> Vec<String> {
    (0..mcq_count as usize)
        .map(|i| {
            let Some(raw) = fixed_key.and_then(|k| k.get(i)) else {
                return DEFAULT_DESIGNATION.to_string();
            };
            let label = raw.trim().to_ascii_uppercase();
            if OPTION_LABELS.contains(&label.as_str()) {
                label
            } else {
                warn!(target: "pipeline", position = i + 1, entry = %raw, "Invalid answer key entry; using default designation");
                DEFAULT_DESIGNATION.to_string()
            }
        })
        .collect()
}

pub struct Synthesizer {
    generator: Option<Arc<dyn QuestionGenerator>>,
    max_per_kind: u32,
}

impl Synthesizer {
    pub fn new(generator: Option<Arc<dyn QuestionGenerator>>) -> Self {
        Self { generator, max_per_kind: Settings::default().max_questions_per_kind }
    }

    pub fn with_max_per_kind(mut self, max_per_kind: u32) -> Self {
        self.max_per_kind = max_per_kind;
        self
    }

    /// Stored batches bypass creation-time validation; cap what they ask for.
    fn bounded_counts(&self, batch: &GenerationBatch) -> (u32, u32) {
        let mcq = batch.mcq_count.min(self.max_per_kind);
        let short = batch.short_answer_count.min(self.max_per_kind);
        if (mcq, short) != (batch.mcq_count, batch.short_answer_count) {
            warn!(
                target: "pipeline",
                batch_id = %batch.id,
                mcq_count = batch.mcq_count,
                short_answer_count = batch.short_answer_count,
                max = self.max_per_kind,
                "Question counts exceed the configured maximum; capping"
            );
        }
        (mcq, short)
    }

    /// `content` is `None` when only the source name is known (e.g. documents
    /// awaiting extraction).
    #[instrument(level = "info", skip(self, content, batch), fields(batch_id = %batch.id, has_content = content.is_some()))]
    pub async fn synthesize(&self, source_name: &str, content: Option<&str>, batch: &GenerationBatch) -> Synthesized {
        let (mcq_count, short_answer_count) = self.bounded_counts(batch);
        let designations = designations(mcq_count, batch.fixed_mcq_answer_key.as_deref());
        let content = content.filter(|c| !c.trim().is_empty());

        let mut draft = GeneratedDraft::default();
        if let (Some(generator), Some(text)) = (&self.generator, content) {
            if mcq_count.saturating_add(short_answer_count) > 0 {
                let req = SynthesisRequest {
                    source_name,
                    content: text,
                    mcq_count,
                    short_answer_count,
                    designations: &designations,
                };
                match generator.generate(&req).await {
                    Ok(d) => draft = d,
                    Err(e) => {
                        warn!(target: "pipeline", generator = generator.name(), error = %e, "Generator failed; using templates");
                    }
                }
            }
        }

        let out = assemble(source_name, content, mcq_count, short_answer_count, &designations, draft);
        debug!(
            target: "pipeline",
            mcq = out.questions.multiple_choice.len(),
            short = out.questions.short_answer.len(),
            "Synthesized question set"
        );
        out
    }
}

/// Merge a (possibly empty) draft onto the required shape. Positions with no
/// acceptable draft item get a template item.
fn assemble(
    source_name: &str,
    content: Option<&str>,
    mcq_count: u32,
    short_answer_count: u32,
    designations: &[String],
    draft: GeneratedDraft,
) -> Synthesized {
    let lines = content.map(content_lines).unwrap_or_default();
    let excerpt = |n: u32| -> Option<String> {
        if lines.is_empty() {
            None
        } else {
            Some(clip(lines[(n as usize - 1) % lines.len()], EXCERPT_CHARS))
        }
    };

    let mut drafted_mcq: HashMap<u32, DraftMcq> = draft
        .multiple_choice
        .into_iter()
        .filter(|d| {
            !d.question.trim().is_empty()
                && d.options.len() == OPTION_LABELS.len()
                && d.options.iter().all(|o| !o.trim().is_empty())
        })
        .map(|d| (d.number, d))
        .collect();
    let mut drafted_short: HashMap<u32, DraftShortAnswer> = draft
        .short_answer
        .into_iter()
        .filter(|d| !d.question.trim().is_empty())
        .map(|d| (d.number, d))
        .collect();

    let mut questions = QuestionSet::default();
    let mut answers = AnswerSet::default();

    for (idx, designation) in designations.iter().enumerate().take(mcq_count as usize) {
        let number = idx as u32 + 1;
        let ex = excerpt(number);
        let (question, options, explanation) = match drafted_mcq.remove(&number) {
            Some(d) => {
                let explanation = if d.explanation.trim().is_empty() {
                    template_explanation(source_name, designation, ex.as_deref())
                } else {
                    d.explanation.trim().to_string()
                };
                (d.question.trim().to_string(), d.options, explanation)
            }
            None => (
                template_mcq_question(number, source_name, ex.as_deref()),
                template_options(source_name, designation),
                template_explanation(source_name, designation, ex.as_deref()),
            ),
        };

        questions.multiple_choice.push(McqQuestion {
            number,
            question,
            options: OPTION_LABELS
                .iter()
                .zip(options)
                .map(|(label, text)| McqOption { label: label.to_string(), text: text.trim().to_string() })
                .collect(),
        });
        answers.multiple_choice.push(Explanation {
            number,
            correct_answer: designation.clone(),
            explanation,
        });
    }

    for offset in 1..=short_answer_count {
        let number = mcq_count.saturating_add(offset);
        let ex = excerpt(number);
        let (question, model_answer) = match drafted_short.remove(&number) {
            Some(d) if !d.model_answer.trim().is_empty() => {
                (d.question.trim().to_string(), d.model_answer.trim().to_string())
            }
            Some(d) => (d.question.trim().to_string(), template_model_answer(source_name, ex.as_deref())),
            None => (
                template_short_question(number, source_name, ex.as_deref()),
                template_model_answer(source_name, ex.as_deref()),
            ),
        };
        questions.short_answer.push(ShortAnswerQuestion { number, question });
        answers.short_answer.push(ShortAnswerKey { number, model_answer });
    }

    Synthesized { questions, answers }
}

fn template_mcq_question(number: u32, source_name: &str, excerpt: Option<&str>) -> String {
    match excerpt {
        Some(ex) => format!(
            "Question {}: According to \"{}\", which statement best explains the following: \"{}\"?",
            number, source_name, ex
        ),
        None => format!(
            "Question {}: Which statement best reflects the material in \"{}\"?",
            number, source_name
        ),
    }
}

fn template_options(source_name: &str, designation: &str) -> Vec<String> {
    OPTION_LABELS
        .iter()
        .map(|label| {
            if *label == designation {
                format!("The statement supported by \"{}\"", source_name)
            } else {
                format!("A statement not supported by \"{}\" ({})", source_name, label)
            }
        })
        .collect()
}

fn template_explanation(source_name: &str, designation: &str, excerpt: Option<&str>) -> String {
    match excerpt {
        Some(ex) => format!(
            "Option {} is correct: it agrees with \"{}\", which states \"{}\".",
            designation, source_name, ex
        ),
        None => format!("Option {} is correct: it agrees with \"{}\".", designation, source_name),
    }
}

fn template_short_question(number: u32, source_name: &str, excerpt: Option<&str>) -> String {
    match excerpt {
        Some(ex) => format!(
            "Question {}: In your own words, explain this idea from \"{}\": \"{}\"",
            number, source_name, ex
        ),
        None => format!(
            "Question {}: In your own words, summarise a key idea from \"{}\".",
            number, source_name
        ),
    }
}

fn template_model_answer(source_name: &str, excerpt: Option<&str>) -> String {
    match excerpt {
        Some(ex) => format!("A complete answer restates and explains: \"{}\"", ex),
        None => format!("A complete answer summarises a key idea from \"{}\" accurately.", source_name),
    }
}
