use serde::{ Serialize, Deserialize };

pub const OFFLINE_LABEL: &str = "Offline";
pub const OFFLINE_ANSWER: &str =
    "I'm sorry, none of my engines could answer right now. Please try again in a moment.";

/// Normalized answer produced by one provider adapter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub answer: String,
    pub confidence_score: u8,
    pub scam_detected: bool,
    pub model_label: String,
}

impl ProviderResult {
    pub fn is_usable(&self) -> bool {
        !self.answer.trim().is_empty()
    }
}

/// Outcome of one tribunal round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TribunalVerdict {
    pub answer: String,
    pub confidence_score: u8,
    pub scam_detected: bool,
    pub model_label: String,
}

impl TribunalVerdict {
    pub fn offline() -> Self {
        Self {
            answer: OFFLINE_ANSWER.to_string(),
            confidence_score: 0,
            scam_detected: false,
            model_label: OFFLINE_LABEL.to_string(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.model_label == OFFLINE_LABEL
    }
}

impl From<ProviderResult> for TribunalVerdict {
    fn from(result: ProviderResult) -> Self {
        Self {
            answer: result.answer,
            confidence_score: result.confidence_score,
            scam_detected: result.scam_detected,
            model_label: result.model_label,
        }
    }
}
