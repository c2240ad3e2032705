use async_trait::async_trait;
use log::error;
use redis::{ AsyncCommands, Client };

use super::{ ConversationStore, StoreError };
use crate::models::chat::{ ChatTurn, Conversation };

/// Conversation logs kept as one Redis list per user, oldest turn at the head.
pub struct RedisConversationStore {
    client: Client,
    key_prefix: String,
}

impl RedisConversationStore {
    pub fn new(host: &str, key_prefix: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(host)?,
            key_prefix: key_prefix.to_string(),
        })
    }

    fn key(&self, user_id: &str) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn append(&self, user_id: &str, turn: ChatTurn) -> Result<(), StoreError> {
        let mut conn = self.get_connection().await?;
        let json_turn = serde_json::to_string(&turn)?;
        let _: i64 = conn.rpush(self.key(user_id), json_turn).await?;
        Ok(())
    }

    async fn conversation(&self, user_id: &str) -> Result<Conversation, StoreError> {
        let mut conn = self.get_connection().await?;
        let json_entries: Vec<String> = conn.lrange(self.key(user_id), 0, -1).await?;
        let mut turns = Vec::with_capacity(json_entries.len());

        for json_entry in &json_entries {
            match serde_json::from_str::<ChatTurn>(json_entry) {
                Ok(turn) => turns.push(turn),
                Err(e) => error!("Error parsing conversation entry for {}: {}", user_id, e),
            }
        }

        Ok(Conversation { user_id: user_id.to_string(), turns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed() {
        let store = RedisConversationStore::new("redis://127.0.0.1:6379", "conversation:").unwrap();
        assert_eq!(store.key("abc123"), "conversation:abc123");
        assert_eq!(store.kind(), "redis");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(RedisConversationStore::new("not a url", "p:").is_err());
    }
}
