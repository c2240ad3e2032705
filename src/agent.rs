use crate::cli::Args;
use crate::config::prompt::{ self, PersonaConfig };
use crate::evidence::{ initialize_evidence_collector, EvidenceCollector };
use crate::history::{ self, initialize_conversation_store, user_id_for, ConversationStore, StoreError };
use crate::llm::chat::{ initialize_adapters, Attachment, Prompt };
use crate::models::chat::{ HistoryEntry, Role };
use crate::models::verdict::TribunalVerdict;
use crate::tier::{ self, MemoryTierTable, TierInfo, TierResolver, UsageInfo };
use crate::tribunal::Tribunal;

use chrono::Utc;
use log::{ info, warn };
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryEntry>,
    pub persona: String,
    pub user_email: String,
    pub user_location: String,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub verdict: TribunalVerdict,
    pub tier_info: TierInfo,
    pub usage_info: UsageInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub tier: tier::Tier,
    pub is_beta: bool,
    pub conversations_today: u32,
    pub total_messages: usize,
    pub usage: UsageInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub engines: Vec<String>,
    pub web_search: bool,
    pub conversation_store: &'static str,
}

/// Request pipeline around the tribunal: tier lookup, evidence, prompt,
/// adjudication and recording, in that order.
#[derive(Clone)]
pub struct ChatAgent {
    tribunal: Tribunal,
    evidence: EvidenceCollector,
    personas: Arc<PersonaConfig>,
    conversations: Arc<dyn ConversationStore>,
    tiers: Arc<dyn TierResolver>,
}

impl ChatAgent {
    pub async fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let adapters = initialize_adapters(args)?;
        if adapters.is_empty() {
            warn!("No chat engines configured; every answer will be the offline fallback");
        }
        let tribunal = Tribunal::new(adapters, Duration::from_secs(args.adapter_timeout_secs));
        let evidence = initialize_evidence_collector(args)?;
        let personas = prompt::load_personas(args.personas_path.as_deref())?;
        let conversations = initialize_conversation_store(args)?;
        let seed = tier::parse_seed(&args.beta_testers)?;
        info!("Beta tester table seeded with {} entr(ies)", seed.len());
        let tiers: Arc<dyn TierResolver> = Arc::new(MemoryTierTable::with_entries(seed));

        Ok(Self::from_parts(tribunal, evidence, personas, conversations, tiers))
    }

    pub fn from_parts(
        tribunal: Tribunal,
        evidence: EvidenceCollector,
        personas: Arc<PersonaConfig>,
        conversations: Arc<dyn ConversationStore>,
        tiers: Arc<dyn TierResolver>
    ) -> Self {
        Self { tribunal, evidence, personas, conversations, tiers }
    }

    pub fn tiers(&self) -> &Arc<dyn TierResolver> {
        &self.tiers
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            engines: self.tribunal.engine_names(),
            web_search: self.evidence.is_enabled(),
            conversation_store: self.conversations.kind(),
        }
    }

    async fn turns_today(&self, user_id: &str) -> Result<(u32, usize), StoreError> {
        let conversation = self.conversations.conversation(user_id).await?;
        let today = conversation.user_turns_on(Utc::now().date_naive()) as u32;
        Ok((today, conversation.turns.len()))
    }

    async fn usage(&self, user_id: &str, tier_info: TierInfo) -> UsageInfo {
        let current = match self.turns_today(user_id).await {
            Ok((today, _)) => today,
            Err(e) => {
                warn!("Could not read conversation log for usage: {}", e);
                0
            }
        };
        tier::usage_for(tier_info.tier, current)
    }

    async fn record_turn(&self, user_id: &str, message: &str, verdict: &TribunalVerdict) {
        if let Err(e) = history::record(self.conversations.as_ref(), user_id, message, Role::User).await {
            warn!("History write (user) failed: {}", e);
        }
        if
            let Err(e) = history::record(
                self.conversations.as_ref(),
                user_id,
                &verdict.answer,
                Role::Assistant
            ).await
        {
            warn!("History write (assistant) failed: {}", e);
        }
    }

    pub async fn process_message(&self, request: ChatRequest) -> ChatReply {
        let user_id = user_id_for(&request.user_email);
        // Advisory only: usage is reported back but never blocks the request.
        let tier_info = self.tiers.resolve(&request.user_email).await;

        let evidence = self.evidence.collect(&request.message, &request.user_location).await;
        let prompt_text = prompt::build_prompt(
            self.personas.instruction(&request.persona),
            &evidence,
            &request.history,
            &request.message
        );
        let prompt = Prompt { text: prompt_text, attachment: request.attachment };

        let verdict = self.tribunal.adjudicate(&prompt).await;
        self.record_turn(&user_id, &request.message, &verdict).await;
        let usage_info = self.usage(&user_id, tier_info).await;

        ChatReply { verdict, tier_info, usage_info }
    }

    pub async fn user_stats(&self, email: &str) -> Result<UserStats, StoreError> {
        let user_id = user_id_for(email);
        let tier_info = self.tiers.resolve(email).await;
        let (today, total) = self.turns_today(&user_id).await?;
        Ok(UserStats {
            tier: tier_info.tier,
            is_beta: tier_info.is_beta,
            conversations_today: today,
            total_messages: total,
            usage: tier::usage_for(tier_info.tier, today),
        })
    }
}
