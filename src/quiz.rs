use chrono::{ DateTime, Utc };
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::history::user_id_for;

pub const QUESTION_COUNT: usize = 5;

/// Onboarding quiz answers for one user. Later submissions replace earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizSubmission {
    pub answers: [String; QUESTION_COUNT],
    pub submitted_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct QuizStore {
    submissions: RwLock<HashMap<String, QuizSubmission>>,
}

impl QuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, email: &str, answers: [String; QUESTION_COUNT]) {
        let submission = QuizSubmission { answers, submitted_at: Utc::now() };
        self.submissions.write().await.insert(user_id_for(email), submission);
    }

    pub async fn get(&self, email: &str) -> Option<QuizSubmission> {
        self.submissions.read().await.get(&user_id_for(email)).cloned()
    }
}
