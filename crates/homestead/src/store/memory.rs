use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Store;
use crate::auth::Actor;
use crate::errors::{StoreError, StoreResult};
use crate::models::conversation::{sort_by_recency, Conversation};
use crate::models::message::Message;

#[derive(Debug, Default)]
struct Tables {
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Vec<Message>>,
}

impl Tables {
    fn owned_mut(&mut self, actor: &Actor, id: Uuid) -> StoreResult<&mut Conversation> {
        self.conversations
            .get_mut(&id)
            .filter(|conversation| conversation.user_id == actor.id)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", id)))
    }

    fn owned(&self, actor: &Actor, id: Uuid) -> StoreResult<&Conversation> {
        self.conversations
            .get(&id)
            .filter(|conversation| conversation.user_id == actor.id)
            .ok_or_else(|| StoreError::NotFound(format!("conversation {}", id)))
    }
}

/// A process local store. Each operation takes one lock, so an insert and its
/// conversation touch are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_conversation(&self, actor: &Actor, title: &str) -> StoreResult<Conversation> {
        let conversation = Conversation::new(actor.id, title);
        let mut tables = self.tables.write().await;
        tables
            .conversations
            .insert(conversation.id, conversation.clone());
        tables.messages.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn list_conversations(&self, actor: &Actor) -> StoreResult<Vec<Conversation>> {
        let tables = self.tables.read().await;
        let mut conversations: Vec<Conversation> = tables
            .conversations
            .values()
            .filter(|conversation| conversation.user_id == actor.id)
            .cloned()
            .collect();
        sort_by_recency(&mut conversations);
        Ok(conversations)
    }

    async fn touch_conversation(&self, actor: &Actor, conversation_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .owned_mut(actor, conversation_id)?
            .touch(Utc::now());
        Ok(())
    }

    async fn delete_conversation(&self, actor: &Actor, conversation_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.owned(actor, conversation_id)?;
        tables.conversations.remove(&conversation_id);
        tables.messages.remove(&conversation_id);
        Ok(())
    }

    async fn insert_message(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
        message: &Message,
    ) -> StoreResult<Message> {
        let mut tables = self.tables.write().await;
        tables
            .owned_mut(actor, conversation_id)?
            .touch(Utc::now());
        tables
            .messages
            .entry(conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message.clone())
    }

    async fn list_messages(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
    ) -> StoreResult<Vec<Message>> {
        let tables = self.tables.read().await;
        tables.owned(actor, conversation_id)?;
        let mut messages = tables
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default();
        // stable, so equal timestamps keep insertion order
        messages.sort_by_key(|message| message.created_at);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::{ContentPart, MessageContent};
    use crate::models::role::Role;

    fn actor() -> Actor {
        Actor::new(Uuid::new_v4(), None, "token")
    }

    #[tokio::test]
    async fn test_messages_come_back_in_creation_order() {
        let store = MemoryStore::new();
        let actor = actor();
        let conversation = store.insert_conversation(&actor, "Lease").await.unwrap();

        let first = Message::user("first");
        let second = Message::assistant("second");
        let third = Message::user("third");
        // insert out of order
        for message in [&third, &first, &second] {
            store
                .insert_message(&actor, conversation.id, message)
                .await
                .unwrap();
        }

        let listed = store.list_messages(&actor, conversation.id).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed
            .windows(2)
            .all(|pair| pair[0].created_at <= pair[1].created_at));
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn test_round_trip_keeps_role_and_content() {
        let store = MemoryStore::new();
        let actor = actor();
        let conversation = store.insert_conversation(&actor, "Docs").await.unwrap();
        let message = Message::user(vec![
            ContentPart::text("Please read"),
            ContentPart::file(vec![1, 2, 3], "application/pdf", Some("deed.pdf".into())),
        ]);

        store
            .insert_message(&actor, conversation.id, &message)
            .await
            .unwrap();
        let listed = store.list_messages(&actor, conversation.id).await.unwrap();

        assert_eq!(listed[0].id, message.id);
        assert_eq!(listed[0].role, Role::User);
        assert!(matches!(listed[0].content, MessageContent::Parts(_)));
        assert_eq!(listed[0].content, message.content);
    }

    #[tokio::test]
    async fn test_insert_message_touches_conversation() {
        let store = MemoryStore::new();
        let actor = actor();
        let older = store.insert_conversation(&actor, "older").await.unwrap();
        let newer = store.insert_conversation(&actor, "newer").await.unwrap();

        store
            .insert_message(&actor, older.id, &Message::user("bump"))
            .await
            .unwrap();

        let listed = store.list_conversations(&actor).await.unwrap();
        assert_eq!(listed[0].id, older.id);
        assert_eq!(listed[1].id, newer.id);
        assert!(listed[0].updated_at >= listed[0].created_at);
    }

    #[tokio::test]
    async fn test_actors_are_isolated() {
        let store = MemoryStore::new();
        let owner = actor();
        let stranger = actor();
        let conversation = store.insert_conversation(&owner, "private").await.unwrap();
        store
            .insert_message(&owner, conversation.id, &Message::user("secret"))
            .await
            .unwrap();

        assert!(store.list_conversations(&stranger).await.unwrap().is_empty());
        assert!(matches!(
            store.list_messages(&stranger, conversation.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store
                .insert_message(&stranger, conversation.id, &Message::user("hi"))
                .await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_conversation(&stranger, conversation.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.list_conversations(&owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = MemoryStore::new();
        let actor = actor();
        let conversation = store.insert_conversation(&actor, "gone").await.unwrap();
        store
            .insert_message(&actor, conversation.id, &Message::user("bye"))
            .await
            .unwrap();

        store
            .delete_conversation(&actor, conversation.id)
            .await
            .unwrap();

        assert!(store.list_conversations(&actor).await.unwrap().is_empty());
        assert!(store
            .list_messages(&actor, conversation.id)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_list_conversations_is_idempotent() {
        let store = MemoryStore::new();
        let actor = actor();
        for title in ["a", "b", "c"] {
            store.insert_conversation(&actor, title).await.unwrap();
        }
        let first = store.list_conversations(&actor).await.unwrap();
        let second = store.list_conversations(&actor).await.unwrap();
        assert_eq!(first, second);
    }
}
