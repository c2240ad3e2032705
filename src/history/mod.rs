mod memory;
mod redis;

use async_trait::async_trait;
use log::info;
use sha2::{ Digest, Sha256 };
use std::sync::Arc;
use thiserror::Error;

use crate::cli::Args;
use crate::models::chat::{ ChatTurn, Conversation, Role };

pub use self::memory::MemoryConversationStore;
pub use self::redis::RedisConversationStore;

const USER_ID_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("stored turn is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported conversation store type: {0}")]
    UnsupportedType(String),
}

/// Opaque, stable identifier for an email address.
pub fn user_id_for(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(USER_ID_LEN);
    id
}

/// Append-only per-user conversation log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    fn kind(&self) -> &'static str;

    async fn append(&self, user_id: &str, turn: ChatTurn) -> Result<(), StoreError>;

    /// All turns for `user_id`, oldest first.
    async fn conversation(&self, user_id: &str) -> Result<Conversation, StoreError>;
}

/// Stamps and appends one turn.
pub async fn record(
    store: &dyn ConversationStore,
    user_id: &str,
    text: &str,
    role: Role
) -> Result<(), StoreError> {
    store.append(user_id, ChatTurn::now(role, text)).await
}

pub fn create_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, StoreError> {
    match args.history_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryConversationStore::new())),
        "redis" => {
            let store = RedisConversationStore::new(&args.history_host, &args.history_redis_prefix)?;
            Ok(Arc::new(store))
        }
        other => Err(StoreError::UnsupportedType(other.to_string())),
    }
}

pub fn initialize_conversation_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, StoreError> {
    if args.history_type.eq_ignore_ascii_case("memory") {
        info!("Conversation logs will be kept in process memory");
    } else {
        info!("Conversation logs will be stored in: {} at {}", args.history_type, args.history_host);
    }
    create_conversation_store(args)
}
