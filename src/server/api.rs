use crate::agent::{ ChatAgent, ChatRequest };
use crate::cli::Args;
use crate::llm::chat::Attachment;
use crate::models::chat::HistoryEntry;
use crate::payments::{ PaymentError, PaymentGateway };
use crate::quiz::{ QuizStore, QUESTION_COUNT };
use crate::tier::{ Tier, TierInfo, UsageInfo };

use super::error::ApiError;
use super::form::FormFields;

use axum::{
    extract::{ DefaultBodyLimit, Path, Query, State },
    routing::{ delete, get, post },
    Json,
    Router,
};
use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use log::{ info, warn };
use serde::{ Deserialize, Serialize };
use serde_json::{ json, Value };
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::cors::{ Any, CorsLayer };
use uuid::Uuid;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

type ChatLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ChatAgent>,
    pub quizzes: Arc<QuizStore>,
    pub payments: Option<Arc<PaymentGateway>>,
    pub admin_email: Option<String>,
    chat_limiter: Option<Arc<ChatLimiter>>,
}

impl AppState {
    pub fn new(
        agent: Arc<ChatAgent>,
        payments: Option<PaymentGateway>,
        admin_email: Option<String>,
        chat_rate_limit: u32
    ) -> Self {
        let chat_limiter = NonZeroU32::new(chat_rate_limit).map(|per_second|
            Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
        );
        let admin_email = admin_email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        if admin_email.is_none() {
            warn!("No ADMIN_EMAIL configured; admin endpoints will reject every call");
        }
        Self {
            agent,
            quizzes: Arc::new(QuizStore::new()),
            payments: payments.map(Arc::new),
            admin_email,
            chat_limiter,
        }
    }

    pub fn from_args(agent: Arc<ChatAgent>, args: &Args) -> Result<Self, PaymentError> {
        let payments = PaymentGateway::from_args(args)?;
        Ok(Self::new(agent, payments, args.admin_email.clone(), args.chat_rate_limit))
    }

    fn authorize_admin(&self, admin_email: Option<&str>) -> Result<(), ApiError> {
        let provided = admin_email.map(|e| e.trim().to_lowercase());
        match (&self.admin_email, provided) {
            (Some(expected), Some(given)) if *expected == given => Ok(()),
            _ => {
                warn!("Rejected admin call from unauthorized identity");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status_handler))
        .route("/chat", post(chat_handler))
        .route("/quiz", post(quiz_handler))
        .route("/user-stats/{user_email}", get(user_stats_handler))
        .route("/create-checkout-session", post(checkout_handler))
        .route("/check-beta-access", post(check_beta_handler))
        .route("/admin/beta-testers", get(list_beta_testers_handler))
        .route("/admin/add-beta-tester", post(add_beta_tester_handler))
        .route("/admin/remove-beta-tester", delete(remove_beta_tester_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    confidence_score: u8,
    scam_detected: bool,
    model_label: String,
    tier_info: TierInfo,
    usage_info: UsageInfo,
}

fn parse_history(raw: Option<&str>) -> Vec<HistoryEntry> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<HistoryEntry>>(raw) {
        Ok(history) => history,
        Err(e) => {
            warn!("Ignoring malformed chat history: {}", e);
            Vec::new()
        }
    }
}

async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    let readiness = state.agent.readiness();
    let status = if readiness.engines.is_empty() { "degraded" } else { "online" };
    Json(
        json!({
            "status": status,
            "engines": readiness.engines,
            "web_search": readiness.web_search,
            "payments": state.payments.is_some(),
            "conversation_store": readiness.conversation_store,
        })
    )
}

async fn chat_handler(
    State(state): State<AppState>,
    fields: FormFields
) -> Result<Json<ChatResponse>, ApiError> {
    if let Some(limiter) = &state.chat_limiter {
        if limiter.check().is_err() {
            warn!("Global chat rate limit exceeded");
            return Err(ApiError::RateLimited);
        }
    }

    let message = fields.required("msg")?.to_string();
    let user_email = fields.required("user_email")?.to_lowercase();
    let attachment = fields.file("file").map(|file| Attachment {
        mime_type: file.content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        data: file.data.clone(),
    });

    let request = ChatRequest {
        message,
        history: parse_history(fields.text("history")),
        persona: fields.text("persona").unwrap_or_default().to_string(),
        user_email,
        user_location: fields.text("user_location").unwrap_or_default().to_string(),
        attachment,
    };

    let request_id = Uuid::new_v4();
    info!(
        "Chat request {} received (persona={:?}, history={}, attachment={})",
        request_id,
        request.persona,
        request.history.len(),
        request.attachment.is_some()
    );
    let reply = state.agent.process_message(request).await;
    info!(
        "Chat request {} answered by {} (confidence {})",
        request_id,
        reply.verdict.model_label,
        reply.verdict.confidence_score
    );
    Ok(
        Json(ChatResponse {
            answer: reply.verdict.answer,
            confidence_score: reply.verdict.confidence_score,
            scam_detected: reply.verdict.scam_detected,
            model_label: reply.verdict.model_label,
            tier_info: reply.tier_info,
            usage_info: reply.usage_info,
        })
    )
}

async fn quiz_handler(
    State(state): State<AppState>,
    fields: FormFields
) -> Result<Json<Value>, ApiError> {
    let user_email = fields.required("user_email")?;
    let answers: [String; QUESTION_COUNT] = std::array::from_fn(|i| {
        fields
            .text(&format!("question{}", i + 1))
            .unwrap_or_default()
            .to_string()
    });
    state.quizzes.save(user_email, answers).await;
    info!("Quiz answers stored");
    Ok(Json(json!({ "status": "success" })))
}

async fn user_stats_handler(
    State(state): State<AppState>,
    Path(user_email): Path<String>
) -> Result<Json<Value>, ApiError> {
    let stats = state.agent
        .user_stats(&user_email).await
        .map_err(|e| ApiError::Internal(format!("Could not load user stats: {}", e)))?;
    Ok(Json(serde_json::to_value(stats).map_err(|e| ApiError::Internal(e.to_string()))?))
}

async fn checkout_handler(
    State(state): State<AppState>,
    fields: FormFields
) -> Result<Json<Value>, ApiError> {
    let user_email = fields.required("user_email")?;
    let payments = state.payments
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable(PaymentError::NotConfigured.to_string()))?;
    let session = payments
        .create_checkout_session(user_email).await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    Ok(Json(json!({ "id": session.id, "url": session.url })))
}

async fn check_beta_handler(
    State(state): State<AppState>,
    fields: FormFields
) -> Result<Json<Value>, ApiError> {
    let email = fields.required("email")?.to_lowercase();
    let info = state.agent.tiers().resolve(&email).await;
    Ok(Json(json!({ "email": email, "tier": info.tier, "is_beta": info.is_beta })))
}

#[derive(Deserialize)]
struct AdminQuery {
    admin_email: Option<String>,
    email: Option<String>,
}

async fn list_beta_testers_handler(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>
) -> Result<Json<Value>, ApiError> {
    state.authorize_admin(query.admin_email.as_deref())?;
    let testers: Vec<Value> = state.agent
        .tiers()
        .beta_testers().await
        .into_iter()
        .map(|(email, tier)| json!({ "email": email, "tier": tier }))
        .collect();
    Ok(Json(json!({ "beta_testers": testers })))
}

async fn add_beta_tester_handler(
    State(state): State<AppState>,
    fields: FormFields
) -> Result<Json<Value>, ApiError> {
    state.authorize_admin(fields.text("admin_email"))?;
    let email = fields.required("email")?.to_lowercase();
    let tier: Tier = fields
        .required("tier")?
        .parse()
        .map_err(|e: crate::tier::TierError| ApiError::BadRequest(e.to_string()))?;
    state.agent.tiers().grant(&email, tier).await;
    Ok(Json(json!({ "status": "added", "email": email, "tier": tier })))
}

async fn remove_beta_tester_handler(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>
) -> Result<Json<Value>, ApiError> {
    state.authorize_admin(query.admin_email.as_deref())?;
    let email = query.email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::MissingField("email".to_string()))?;
    if !state.agent.tiers().revoke(&email).await {
        return Err(ApiError::NotFound(format!("Beta tester {}", email)));
    }
    Ok(Json(json!({ "status": "removed", "email": email })))
}
