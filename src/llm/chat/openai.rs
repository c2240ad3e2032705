use async_trait::async_trait;
use log::{ info, warn };
use reqwest::{ Client as HttpClient, header::AUTHORIZATION };
use serde::{ Deserialize, Serialize };

use super::{ build_http_client, parse_structured_reply, Prompt, ProviderAdapter, ProviderError };
use crate::llm::LlmConfig;
use crate::models::verdict::ProviderResult;

/// OpenAI-compatible chat completions engine. One call, no fallback model.
pub struct OpenAIAdapter {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
    label: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

impl OpenAIAdapter {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        http: HttpClient
    ) -> Self {
        let label = format!("OpenAI ({})", model);
        Self { http, api_key, model, base_url, label }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| ProviderError::Config("OpenAI API key is required".into()))?;
        let model = config.models
            .first()
            .cloned()
            .ok_or_else(|| ProviderError::Config("OpenAI model is required".into()))?;
        let http = build_http_client(config.timeout)?;
        Ok(Self::new(api_key, model, config.base_url.clone(), http))
    }

    async fn complete(&self, prompt: &Prompt) -> Result<ProviderResult, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let req = OpenAIChatRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: Some(prompt.text.clone()),
            }],
            temperature: 0.7,
            response_format: ResponseFormat { format_type: "json_object".to_string() },
        };

        let resp = self.http.post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<OpenAIResponse>()
            .await?;

        let content = resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        parse_structured_reply(&content, &self.label)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIAdapter {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn invoke(&self, prompt: &Prompt) -> Option<ProviderResult> {
        info!("OpenAIAdapter::invoke() → model={} base_url={}", self.model, self.base_url);
        if prompt.attachment.is_some() {
            info!("OpenAI engine answers from text only; attachment not forwarded");
        }
        match self.complete(prompt).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!("OpenAI model {} failed: {}", self.model, e);
                None
            }
        }
    }
}
