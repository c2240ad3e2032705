use async_trait::async_trait;
use base64::{ engine::general_purpose::STANDARD as BASE64, Engine as _ };
use log::{ info, warn };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };

use super::{ build_http_client, parse_structured_reply, Prompt, ProviderAdapter, ProviderError };
use crate::llm::LlmConfig;
use crate::models::verdict::ProviderResult;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart {
    Text(String),
    InlineData(InlineData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// MIME types Gemini accepts as inline data.
fn accepts_inline(mime_type: &str) -> bool {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    mime_type.starts_with("image/") || mime_type.starts_with("text/") || mime_type == "application/pdf"
}

fn build_request(prompt: &Prompt) -> GenerateRequest {
    let mut parts = vec![GeminiPart::Text(prompt.text.clone())];
    if let Some(attachment) = &prompt.attachment {
        if !accepts_inline(&attachment.mime_type) {
            info!("GeminiAdapter: attachment of type {} not forwarded", attachment.mime_type);
        } else {
            parts.push(
                GeminiPart::InlineData(InlineData {
                    mime_type: attachment.mime_type.clone(),
                    data: BASE64.encode(&attachment.data),
                })
            );
        }
    }
    GenerateRequest {
        contents: vec![GeminiContent { role: "user".to_string(), parts }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".to_string(),
        },
    }
}

/// Gemini engine. Walks its model list in order and settles on the first
/// model that produces a schema-valid answer.
pub struct GeminiAdapter {
    http: HttpClient,
    api_key: String,
    models: Vec<String>,
    base_url: String,
}

impl GeminiAdapter {
    pub fn new(
        api_key: String,
        models: Vec<String>,
        base_url: String,
        http: HttpClient
    ) -> Result<Self, ProviderError> {
        if models.is_empty() {
            return Err(ProviderError::Config("Gemini needs at least one model".into()));
        }
        Ok(Self { http, api_key, models, base_url })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| ProviderError::Config("Google API key is required for GeminiAdapter".into()))?;
        let http = build_http_client(config.timeout)?;
        Self::new(api_key, config.models.clone(), config.base_url.clone(), http)
    }

    pub fn label_for(model: &str) -> String {
        format!("Gemini ({})", model)
    }

    async fn generate(&self, model: &str, prompt: &Prompt) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), model);
        let resp = self.http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(prompt))
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;
        Ok(resp.text())
    }

    async fn try_model(&self, model: &str, prompt: &Prompt) -> Result<ProviderResult, ProviderError> {
        let text = self.generate(model, prompt).await?;
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        parse_structured_reply(&text, &Self::label_for(model))
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn invoke(&self, prompt: &Prompt) -> Option<ProviderResult> {
        for model in &self.models {
            info!("GeminiAdapter::invoke() → model={} base_url={}", model, self.base_url);
            match self.try_model(model, prompt).await {
                Ok(result) => {
                    return Some(result);
                }
                Err(e) => warn!("Gemini model {} failed: {}", model, e),
            }
        }
        warn!("Gemini: every model in {:?} failed", self.models);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::Attachment;
    use axum::{ extract::Path, http::StatusCode, routing::post, Json, Router };
    use serde_json::{ json, Value };
    use std::time::Duration;

    async fn fake_generate(Path(call): Path<String>) -> (StatusCode, Json<Value>) {
        let model = call.split(':').next().unwrap_or_default().to_string();
        let text = match model.as_str() {
            "retired-model" => {
                return (StatusCode::NOT_FOUND, Json(json!({"error": "model not found"})));
            }
            "silent-model" => String::new(),
            "chatty-model" => "I think the answer is yes.".to_string(),
            _ =>
                json!({
                    "answer": format!("answer from {}", model),
                    "confidence_score": 77,
                    "scam_detected": false
                }).to_string(),
        };
        (StatusCode::OK, Json(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})))
    }

    async fn spawn_fake_gemini() -> String {
        let app = Router::new().route("/models/{call}", post(fake_generate));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn adapter(base_url: String, models: &[&str]) -> GeminiAdapter {
        GeminiAdapter::new(
            "test-key".into(),
            models.iter().map(|m| m.to_string()).collect(),
            base_url,
            build_http_client(Duration::from_secs(5)).unwrap()
        ).unwrap()
    }

    #[tokio::test]
    async fn falls_through_to_first_working_model() {
        let base = spawn_fake_gemini().await;
        let gemini = adapter(base, &["retired-model", "silent-model", "chatty-model", "gemini-2.0-flash", "gemini-1.5-pro"]);
        let result = gemini.invoke(&Prompt::text("question")).await.unwrap();
        assert_eq!(result.answer, "answer from gemini-2.0-flash");
        assert_eq!(result.model_label, "Gemini (gemini-2.0-flash)");
        assert_eq!(result.confidence_score, 77);
    }

    #[tokio::test]
    async fn all_models_failing_is_failure() {
        let base = spawn_fake_gemini().await;
        let gemini = adapter(base, &["retired-model", "silent-model"]);
        assert!(gemini.invoke(&Prompt::text("question")).await.is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_is_failure() {
        let gemini = adapter("http://127.0.0.1:9".into(), &["gemini-2.0-flash"]);
        assert!(gemini.invoke(&Prompt::text("question")).await.is_none());
    }

    #[test]
    fn request_carries_json_mode_and_attachment() {
        let prompt = Prompt {
            text: "look at this".into(),
            attachment: Some(Attachment { mime_type: "image/png".into(), data: vec![1, 2, 3] }),
        };
        let body = serde_json::to_value(build_request(&prompt)).unwrap();
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "look at this");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
    }

    #[test]
    fn unsupported_attachment_is_left_out() {
        for mime_type in [
            "application/octet-stream",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ] {
            let prompt = Prompt {
                text: "summarize this".into(),
                attachment: Some(Attachment { mime_type: mime_type.into(), data: vec![9, 9] }),
            };
            let body = serde_json::to_value(build_request(&prompt)).unwrap();
            let parts = body["contents"][0]["parts"].as_array().unwrap();
            assert_eq!(parts.len(), 1, "{} should not be forwarded", mime_type);
            assert_eq!(parts[0]["text"], "summarize this");
        }
    }

    #[test]
    fn pdf_and_text_attachments_are_forwarded() {
        for mime_type in ["application/pdf", "text/plain", "IMAGE/JPEG"] {
            let prompt = Prompt {
                text: "read".into(),
                attachment: Some(Attachment { mime_type: mime_type.into(), data: vec![1] }),
            };
            let body = serde_json::to_value(build_request(&prompt)).unwrap();
            assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], mime_type);
        }
    }

    #[tokio::test]
    async fn unsupported_attachment_still_gets_an_answer() {
        let base = spawn_fake_gemini().await;
        let gemini = adapter(base, &["gemini-2.0-flash"]);
        let prompt = Prompt {
            text: "question".into(),
            attachment: Some(Attachment { mime_type: "application/octet-stream".into(), data: vec![0; 16] }),
        };
        let result = gemini.invoke(&prompt).await.unwrap();
        assert_eq!(result.answer, "answer from gemini-2.0-flash");
    }

    #[test]
    fn empty_model_list_is_rejected() {
        let http = build_http_client(Duration::from_secs(1)).unwrap();
        assert!(GeminiAdapter::new("k".into(), Vec::new(), "http://x".into(), http).is_err());
    }
}
