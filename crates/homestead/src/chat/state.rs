use std::collections::HashSet;
use uuid::Uuid;

use crate::models::conversation::Conversation;
use crate::models::message::Message;

/// Key of the in-flight guard: one turn at a time per conversation, plus one for
/// the not yet created conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnSlot {
    Draft,
    Conversation(Uuid),
}

impl TurnSlot {
    pub fn for_conversation(conversation_id: Option<Uuid>) -> Self {
        match conversation_id {
            Some(id) => TurnSlot::Conversation(id),
            None => TurnSlot::Draft,
        }
    }
}

/// Everything a front end renders. Published through a watch channel; each
/// change is applied in a single transition, so a snapshot is always consistent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub actor_signed_in: bool,
    pub active_conversation: Option<Uuid>,
    /// Messages of the active conversation in creation order
    pub messages: Vec<Message>,
    /// The actor's conversations, most recently active first
    pub conversations: Vec<Conversation>,
    /// The assistant answer currently being streamed, if any
    pub streaming: Option<Message>,
    pub in_flight: HashSet<TurnSlot>,
    /// User messages whose turn failed
    pub unsent: HashSet<Uuid>,
}

impl ChatState {
    pub fn is_busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_unsent(&self, message_id: Uuid) -> bool {
        self.unsent.contains(&message_id)
    }

    /// Messages in display order, the streaming answer last
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().chain(self.streaming.iter())
    }

    pub fn active_title(&self) -> Option<&str> {
        let active = self.active_conversation?;
        self.conversations
            .iter()
            .find(|conversation| conversation.id == active)
            .map(|conversation| conversation.title.as_str())
    }
}
