pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use log::{ info, warn };
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::{ LlmConfig, LlmType };
use self::gemini::GeminiAdapter;
use self::openai::OpenAIAdapter;
use crate::cli::Args;
use crate::models::verdict::ProviderResult;

/// Uploaded file forwarded to engines that accept inline media.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// The shared prompt every engine receives in one tribunal round.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), attachment: None }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("engine returned an empty response")]
    EmptyResponse,
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response violates the answer schema: {0}")]
    Schema(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// One model backend taking part in the tribunal.
///
/// `invoke` never fails: every backend error is logged by the adapter and
/// reported as `None`, so the coordinator can treat all engines uniformly.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, prompt: &Prompt) -> Option<ProviderResult>;
}

#[derive(Deserialize)]
struct StructuredReply {
    answer: String,
    confidence_score: serde_json::Number,
    scam_detected: bool,
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Validates an engine's raw text against the answer schema and tags it.
pub fn parse_structured_reply(
    raw: &str,
    model_label: &str
) -> Result<ProviderResult, ProviderError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    let reply: StructuredReply = serde_json::from_str(body)?;

    let score = reply.confidence_score
        .as_f64()
        .ok_or_else(|| ProviderError::Schema("confidence_score is not a number".into()))?;
    if !(0.0..=100.0).contains(&score) {
        return Err(
            ProviderError::Schema(format!("confidence_score {} outside 0-100", score))
        );
    }

    Ok(ProviderResult {
        answer: reply.answer,
        confidence_score: score.round() as u8,
        scam_detected: reply.scam_detected,
        model_label: model_label.to_string(),
    })
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder().timeout(timeout).build().map_err(ProviderError::from)
}

pub fn new_adapter(config: &LlmConfig) -> Result<Arc<dyn ProviderAdapter>, ProviderError> {
    let adapter: Arc<dyn ProviderAdapter> = match config.llm_type {
        LlmType::Gemini => Arc::new(GeminiAdapter::from_config(config)?),
        LlmType::OpenAI => Arc::new(OpenAIAdapter::from_config(config)?),
    };
    Ok(adapter)
}

/// Per-request HTTP timeout for an engine that may make `attempts` calls
/// inside one adapter deadline. Each call gets an equal share so a stalled
/// first model cannot starve the fallbacks.
pub fn per_call_timeout(http_timeout: Duration, adapter_timeout: Duration, attempts: usize) -> Duration {
    let attempts = u32::try_from(attempts.max(1)).unwrap_or(u32::MAX);
    http_timeout.min(adapter_timeout / attempts)
}

pub fn engine_configs(args: &Args) -> Vec<LlmConfig> {
    let http_timeout = Duration::from_secs(args.http_timeout_secs);
    let adapter_timeout = Duration::from_secs(args.adapter_timeout_secs);
    let gemini_models: Vec<String> = args.gemini_models
        .iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    vec![
        LlmConfig {
            llm_type: LlmType::Gemini,
            api_key: Some(args.gemini_api_key.clone()).filter(|k| !k.is_empty()),
            timeout: per_call_timeout(http_timeout, adapter_timeout, gemini_models.len()),
            models: gemini_models,
            base_url: args.gemini_base_url.clone(),
        },
        LlmConfig {
            llm_type: LlmType::OpenAI,
            api_key: Some(args.openai_api_key.clone()).filter(|k| !k.is_empty()),
            models: vec![args.openai_model.clone()],
            base_url: args.openai_base_url.clone(),
            timeout: per_call_timeout(http_timeout, adapter_timeout, 1),
        }
    ]
}

/// Builds the adapters in registration order. Engines without credentials
/// are skipped rather than failing startup.
pub fn initialize_adapters(
    args: &Args
) -> Result<Vec<Arc<dyn ProviderAdapter>>, ProviderError> {
    let mut adapters = Vec::new();
    for config in engine_configs(args) {
        if !config.is_enabled() {
            warn!("{} engine disabled: no API key configured", config.llm_type);
            continue;
        }
        let adapter = new_adapter(&config)?;
        info!("{} engine configured: Models={:?}, BaseURL={}", config.llm_type, config.models, config.base_url);
        adapters.push(adapter);
    }
    Ok(adapters)
}
