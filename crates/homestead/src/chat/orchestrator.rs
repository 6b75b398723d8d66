use anyhow::Result;
use futures::StreamExt;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::state::{ChatState, TurnSlot};
use crate::assembler::ChatRequest;
use crate::auth::Actor;
use crate::completion::{Completion, Reply};
use crate::errors::StoreResult;
use crate::models::content::MessageContent;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, PromptMessage};
use crate::store::Store;

pub const TITLE_PROMPT: &str = "You are a title generator. Generate a very brief (3-5 words) title. Response should be ONLY the title, nothing else.";

const TITLE_FALLBACK_CHARS: usize = 100;

/// How a call to [`Orchestrator::send_message`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The turn finished; carries the conversation the turn belongs to
    Completed { conversation_id: Option<Uuid> },
    /// Nobody is signed in; nothing was sent or stored
    SignInRequired,
    /// Another turn is running for the same conversation
    Busy,
    /// The content was empty
    Rejected,
    /// The completion failed; the user message stays in state, flagged unsent
    Failed { conversation_id: Option<Uuid> },
}

/// Holds in-flight slots for one turn and releases them on drop
struct TurnGuard<'a> {
    state: &'a watch::Sender<ChatState>,
    slots: Vec<TurnSlot>,
}

impl<'a> TurnGuard<'a> {
    fn claim(state: &'a watch::Sender<ChatState>, slot: TurnSlot) -> Option<Self> {
        let claimed = state.send_if_modified(|state| state.in_flight.insert(slot));
        claimed.then(|| TurnGuard {
            state,
            slots: vec![slot],
        })
    }

    fn extend(&mut self, slot: TurnSlot) {
        if self.state.send_if_modified(|state| state.in_flight.insert(slot)) {
            self.slots.push(slot);
        }
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let slots = std::mem::take(&mut self.slots);
        self.state.send_modify(|state| {
            for slot in &slots {
                state.in_flight.remove(slot);
            }
        });
    }
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    completion: Arc<dyn Completion>,
    actor: RwLock<Option<Actor>>,
    state: watch::Sender<ChatState>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn Store>, completion: Arc<dyn Completion>) -> Self {
        let (state, _) = watch::channel(ChatState::default());
        Self {
            store,
            completion,
            actor: RwLock::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ChatState {
        self.state.borrow().clone()
    }

    pub async fn actor(&self) -> Option<Actor> {
        self.actor.read().await.clone()
    }

    /// Start a session for the actor and load their conversations
    pub async fn sign_in(&self, actor: Actor) {
        info!(actor = %actor.id, "Signed in");
        *self.actor.write().await = Some(actor);
        self.state.send_replace(ChatState {
            actor_signed_in: true,
            ..Default::default()
        });
        self.load_conversations().await;
    }

    pub async fn sign_out(&self) {
        *self.actor.write().await = None;
        self.state.send_replace(ChatState::default());
    }

    /// Leave the active conversation; the next message starts a new one
    pub fn new_conversation(&self) {
        self.state.send_modify(|state| {
            state.active_conversation = None;
            state.messages.clear();
            state.streaming = None;
            state.unsent.clear();
        });
    }

    /// Replace the visible messages with the persisted history of a conversation
    #[instrument(skip(self))]
    pub async fn load_messages(&self, conversation_id: Uuid) -> Vec<Message> {
        let Some(actor) = self.actor().await else {
            return Vec::new();
        };
        match self.open_conversation(&actor, conversation_id).await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Error loading messages");
                Vec::new()
            }
        }
    }

    /// Make a conversation active with its persisted history. On error the view is untouched.
    async fn open_conversation(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
    ) -> StoreResult<Vec<Message>> {
        let messages = self.store.list_messages(actor, conversation_id).await?;
        let present: HashSet<Uuid> = messages.iter().map(|m| m.id).collect();
        self.state.send_modify(|state| {
            if state.active_conversation != Some(conversation_id) {
                state.streaming = None;
            }
            state.active_conversation = Some(conversation_id);
            state.messages = messages.clone();
            state.unsent.retain(|id| present.contains(id));
        });
        Ok(messages)
    }

    #[instrument(skip(self))]
    pub async fn load_conversations(&self) -> Vec<Conversation> {
        let Some(actor) = self.actor().await else {
            return Vec::new();
        };
        match self.store.list_conversations(&actor).await {
            Ok(conversations) => {
                self.state.send_modify(|state| state.conversations = conversations.clone());
                conversations
            }
            Err(e) => {
                error!(error = %e, "Error loading conversations");
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_conversation(&self, conversation_id: Uuid) -> bool {
        let Some(actor) = self.actor().await else {
            return false;
        };
        if let Err(e) = self.store.delete_conversation(&actor, conversation_id).await {
            error!(error = %e, "Error deleting conversation");
            return false;
        }
        self.state.send_modify(|state| {
            if state.active_conversation == Some(conversation_id) {
                state.active_conversation = None;
                state.messages.clear();
                state.streaming = None;
                state.unsent.clear();
            }
        });
        self.load_conversations().await;
        true
    }

    /// Run one chat turn
    #[instrument(skip(self, content))]
    pub async fn send_message<C: Into<MessageContent>>(
        &self,
        content: C,
        conversation_id: Option<Uuid>,
    ) -> SendOutcome {
        let content = content.into();
        let Some(actor) = self.actor().await else {
            return SendOutcome::SignInRequired;
        };
        if content.is_empty() {
            return SendOutcome::Rejected;
        }
        let Some(mut guard) =
            TurnGuard::claim(&self.state, TurnSlot::for_conversation(conversation_id))
        else {
            debug!("Turn already in flight");
            return SendOutcome::Busy;
        };

        let active = self.state.borrow().active_conversation;
        match conversation_id {
            Some(id) if active != Some(id) => {
                if let Err(e) = self.open_conversation(&actor, id).await {
                    error!(error = %e, conversation_id = %id, "Error opening conversation");
                    return SendOutcome::Failed {
                        conversation_id: Some(id),
                    };
                }
            }
            Some(_) => {}
            // a turn without an id never continues the conversation on screen
            None if active.is_some() => self.new_conversation(),
            None => {}
        }

        let mut conversation_id = conversation_id;
        if conversation_id.is_none() && !content.has_files() {
            conversation_id = self.start_conversation(&actor, &content).await;
            if let Some(id) = conversation_id {
                guard.extend(TurnSlot::Conversation(id));
            }
        }

        let user_message = Message::user(content);
        let mut prior = Vec::new();
        self.state.send_modify(|state| {
            if state.active_conversation == conversation_id {
                prior = state.messages.clone();
                state.messages.push(user_message.clone());
            }
        });
        if let Some(id) = conversation_id {
            self.persist(&actor, id, &user_message).await;
        }

        let result = if user_message.content.has_files() {
            self.answer_whole(&actor, conversation_id, &user_message, &prior)
                .await
        } else {
            self.answer_streamed(&actor, conversation_id, &user_message, &prior)
                .await
        };

        match result {
            Ok(()) => SendOutcome::Completed { conversation_id },
            Err(e) => {
                error!(error = %e, "Error sending message");
                self.state.send_modify(|state| {
                    state.unsent.insert(user_message.id);
                });
                SendOutcome::Failed { conversation_id }
            }
        }
    }

    /// Create a titled conversation for the first message of a draft and make it active
    async fn start_conversation(&self, actor: &Actor, content: &MessageContent) -> Option<Uuid> {
        let text = content.as_plain_text();
        let title = self.generate_title(&text).await;
        match self.store.insert_conversation(actor, &title).await {
            Ok(conversation) => {
                info!(conversation_id = %conversation.id, title = %conversation.title, "Created conversation");
                self.state.send_modify(|state| {
                    state.active_conversation = Some(conversation.id);
                    state.messages.clear();
                    state.streaming = None;
                    state.unsent.clear();
                });
                self.load_conversations().await;
                Some(conversation.id)
            }
            Err(e) => {
                error!(error = %e, "Error creating conversation");
                None
            }
        }
    }

    async fn generate_title(&self, text: &str) -> String {
        let request = ChatRequest::Messages {
            messages: vec![PromptMessage::system(TITLE_PROMPT), PromptMessage::user(text)],
        };
        let title = match self.completion.respond(request).await {
            Ok(reply) => reply.collect().await,
            Err(e) => Err(e),
        };
        match title {
            Ok(title) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => text.chars().take(TITLE_FALLBACK_CHARS).collect(),
            Err(e) => {
                warn!(error = %e, "Error generating title");
                text.chars().take(TITLE_FALLBACK_CHARS).collect()
            }
        }
    }

    async fn persist(&self, actor: &Actor, conversation_id: Uuid, message: &Message) {
        if let Err(e) = self
            .store
            .insert_message(actor, conversation_id, message)
            .await
        {
            error!(error = %e, message_id = %message.id, "Error saving message");
        }
    }

    /// File-bearing turn: send the stored history and the new message, wait for the whole answer
    async fn answer_whole(
        &self,
        actor: &Actor,
        conversation_id: Option<Uuid>,
        user_message: &Message,
        prior: &[Message],
    ) -> Result<()> {
        let history = match conversation_id {
            Some(id) => self
                .store
                .list_messages(actor, id)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Error loading history");
                    Vec::new()
                }),
            None => prior.to_vec(),
        };
        let mut messages: Vec<PromptMessage> = history
            .iter()
            .filter(|message| message.id != user_message.id)
            .map(PromptMessage::from)
            .collect();
        messages.push(PromptMessage::from(user_message));

        let reply = self
            .completion
            .respond(ChatRequest::Attachments {
                conversation_id,
                messages,
            })
            .await?;
        let answer = Message::assistant(reply.collect().await?);

        if let Some(id) = conversation_id {
            self.persist(actor, id, &answer).await;
        }
        self.state.send_modify(|state| {
            if state.active_conversation == conversation_id {
                state.messages.push(answer);
            }
        });
        Ok(())
    }

    /// Text turn: stream the answer into the transient message, then finalize it
    async fn answer_streamed(
        &self,
        actor: &Actor,
        conversation_id: Option<Uuid>,
        user_message: &Message,
        prior: &[Message],
    ) -> Result<()> {
        let history = prior
            .iter()
            .map(|message| PromptMessage::new(message.role, message.text()))
            .collect();
        let reply = self
            .completion
            .respond(ChatRequest::Prompt {
                prompt: user_message.text(),
                history,
                conversation_id,
            })
            .await?;

        let streaming = Message::assistant("");
        let streaming_id = streaming.id;
        self.state.send_modify(|state| {
            if state.active_conversation == conversation_id {
                state.streaming = Some(streaming);
            }
        });

        let text = match self.consume(reply, streaming_id).await {
            Ok(text) => text,
            Err(e) => {
                self.clear_streaming(streaming_id);
                return Err(e);
            }
        };

        let answer = Message::assistant(text).with_id(streaming_id);
        if let Some(id) = conversation_id {
            self.persist(actor, id, &answer).await;
        }
        self.state.send_modify(|state| {
            if state.streaming.as_ref().map(|m| m.id) == Some(streaming_id) {
                state.streaming = None;
            }
            if state.active_conversation == conversation_id {
                state.messages.push(answer);
            }
        });
        Ok(())
    }

    async fn consume(&self, reply: Reply, streaming_id: Uuid) -> Result<String> {
        match reply {
            Reply::Text(text) => {
                self.apply_delta(streaming_id, &text);
                Ok(text)
            }
            Reply::Stream(mut stream) => {
                let mut text = String::new();
                while let Some(delta) = stream.next().await {
                    let delta = delta?;
                    self.apply_delta(streaming_id, &delta);
                    text.push_str(&delta);
                }
                Ok(text)
            }
        }
    }

    fn apply_delta(&self, streaming_id: Uuid, delta: &str) {
        self.state.send_if_modified(|state| match state.streaming.as_mut() {
            Some(message) if message.id == streaming_id && !delta.is_empty() => {
                message.content.push_text(delta);
                true
            }
            _ => false,
        });
    }

    fn clear_streaming(&self, streaming_id: Uuid) {
        self.state.send_if_modified(|state| {
            if state.streaming.as_ref().map(|m| m.id) == Some(streaming_id) {
                state.streaming = None;
                true
            } else {
                false
            }
        });
    }
}
