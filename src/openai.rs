//! Minimal OpenAI client used as the question generator.
//!
//! We only call chat.completions and request a strict JSON object.
//! Calls are instrumented and log model names, latencies, and usage (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::config::Prompts;
use crate::error::GeneratorError;
use crate::pipeline::synth::{GeneratedDraft, QuestionGenerator, SynthesisRequest};
use crate::util::{clip, fill_template, trunc_for_log};

/// Upper bound on material chars sent per request.
const MAX_CONTENT_CHARS: usize = 12_000;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
  pub prompts: Prompts,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model =
      std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(60))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model, prompts })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %self.model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, GeneratorError> {
    let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, "quizgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| GeneratorError::Request(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 300));
      return Err(GeneratorError::HttpStatus { status, message });
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| GeneratorError::Parse(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();
    debug!(response = %trunc_for_log(&text, 200), "OpenAI raw response");

    serde_json::from_str::<T>(&text).map_err(|e| GeneratorError::Parse(e.to_string()))
  }
}

/// Render the user prompt for a synthesis request.
pub fn render_quiz_prompt(prompts: &Prompts, req: &SynthesisRequest<'_>) -> String {
  let mcq_count = req.mcq_count.to_string();
  let short_answer_count = req.short_answer_count.to_string();
  let designations = if req.designations.is_empty() {
    "(none)".to_string()
  } else {
    req.designations.iter().enumerate()
      .map(|(i, d)| format!("{}={}", i + 1, d))
      .collect::<Vec<_>>()
      .join(", ")
  };
  let content = clip(req.content, MAX_CONTENT_CHARS);
  fill_template(
    &prompts.quiz_user_template,
    &[
      ("source_name", req.source_name),
      ("content", &content),
      ("mcq_count", &mcq_count),
      ("short_answer_count", &short_answer_count),
      ("designations", &designations),
    ],
  )
}

#[async_trait]
impl QuestionGenerator for OpenAI {
  fn name(&self) -> &str {
    "openai"
  }

  #[instrument(level = "info", skip(self, req), fields(source = %req.source_name, mcq = req.mcq_count, short = req.short_answer_count))]
  async fn generate(&self, req: &SynthesisRequest<'_>) -> Result<GeneratedDraft, GeneratorError> {
    let user = render_quiz_prompt(&self.prompts, req);
    let start = std::time::Instant::now();
    let result = self.chat_json::<GeneratedDraft>(&self.prompts.quiz_system, &user, 0.4).await;
    let elapsed = start.elapsed();

    match &result {
      Ok(d) => info!(?elapsed, mcq = d.multiple_choice.len(), short = d.short_answer.len(), "Model response received successfully"),
      Err(e) => error!(?elapsed, error = %e, "Model call failed during quiz generation"),
    }
    result
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
