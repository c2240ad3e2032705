pub mod chat;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmType {
    Gemini,
    OpenAI,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::Gemini => write!(f, "Gemini"),
            LlmType::OpenAI => write!(f, "OpenAI"),
        }
    }
}

/// Connection settings for one engine. `models` is ordered: engines that
/// retry walk it front to back, single-shot engines only use the first entry.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub models: Vec<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_disables_engine() {
        let config = LlmConfig {
            llm_type: LlmType::OpenAI,
            api_key: Some("  ".into()),
            models: vec!["gpt-4o-mini".into()],
            base_url: "https://api.openai.com".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(!config.is_enabled());
    }
}
