//! Persistence of conversations and messages.
//!
//! Every operation is scoped to an [`Actor`]: an actor never observes another actor's
//! conversations or messages, and foreign ids behave as if they did not exist.
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::Actor;
use crate::errors::StoreResult;
use crate::models::conversation::Conversation;
use crate::models::message::Message;

pub use memory::MemoryStore;
pub use rest::RestStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Create a conversation owned by the actor
    async fn insert_conversation(&self, actor: &Actor, title: &str) -> StoreResult<Conversation>;

    /// All of the actor's conversations, most recently active first
    async fn list_conversations(&self, actor: &Actor) -> StoreResult<Vec<Conversation>>;

    /// Bump `updated_at` to now
    async fn touch_conversation(&self, actor: &Actor, conversation_id: Uuid) -> StoreResult<()>;

    /// Remove a conversation together with all of its messages
    async fn delete_conversation(&self, actor: &Actor, conversation_id: Uuid) -> StoreResult<()>;

    /// Persist a message under a conversation, keeping its client generated id.
    ///
    /// The owning conversation is touched as part of the same call; the insert is
    /// reported as failed if the touch fails.
    async fn insert_message(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
        message: &Message,
    ) -> StoreResult<Message>;

    /// The conversation's messages in ascending `created_at` order
    async fn list_messages(&self, actor: &Actor, conversation_id: Uuid)
        -> StoreResult<Vec<Message>>;
}
