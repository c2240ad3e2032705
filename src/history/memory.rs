use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{ ConversationStore, StoreError };
use crate::models::chat::{ ChatTurn, Conversation };

#[derive(Default)]
pub struct MemoryConversationStore {
    logs: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn append(&self, user_id: &str, turn: ChatTurn) -> Result<(), StoreError> {
        self.logs.write().await.entry(user_id.to_string()).or_default().push(turn);
        Ok(())
    }

    async fn conversation(&self, user_id: &str) -> Result<Conversation, StoreError> {
        let turns = self.logs.read().await.get(user_id).cloned().unwrap_or_default();
        Ok(Conversation { user_id: user_id.to_string(), turns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use std::sync::Arc;

    #[tokio::test]
    async fn unknown_user_has_empty_log() {
        let store = MemoryConversationStore::new();
        assert!(store.conversation("nobody").await.unwrap().turns.is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let store = Arc::new(MemoryConversationStore::new());
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.append("u1", ChatTurn::now(Role::User, &format!("m{}", i))).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.conversation("u1").await.unwrap().turns.len(), 50);
    }
}
