use anyhow::{bail, Result};
use homestead::chat::{Orchestrator, SendOutcome};
use homestead::models::content::MessageContent;
use homestead::models::message::Message;
use homestead::models::role::Role;
use homestead::topics::{find_topic, TOPICS};
use std::sync::Arc;
use uuid::Uuid;

use super::Context;
use crate::prompt::cliclack::CliclackPrompt;
use crate::prompt::{Input, Prompt, HELP};

pub const SIGN_IN_HINT: &str = "Sign in with `homestead login` to start chatting";

/// An interactive chat loop over one orchestrator
pub struct ChatSession<P: Prompt> {
    orchestrator: Arc<Orchestrator>,
    prompt: P,
}

impl<P: Prompt> ChatSession<P> {
    pub fn new(orchestrator: Arc<Orchestrator>, prompt: P) -> Self {
        Self {
            orchestrator,
            prompt,
        }
    }

    pub async fn start(&mut self, conversation: Option<Uuid>, opener: Option<String>) -> Result<()> {
        if let Some(id) = conversation {
            self.open(id).await;
        }
        if let Some(text) = opener {
            self.prompt.render(&Message::user(text.as_str()));
            self.send(text).await;
        }

        loop {
            match self.prompt.get_input()? {
                Input::Exit => break,
                Input::AskAgain => continue,
                Input::Help => self.prompt.info(HELP),
                Input::Invalid(usage) => self.prompt.error(&usage),
                Input::New => {
                    self.orchestrator.new_conversation();
                    self.prompt.info("Started a new conversation");
                }
                Input::List => self.list().await,
                Input::Open(id) => self.open(id).await,
                Input::Delete(id) => {
                    if self.orchestrator.delete_conversation(id).await {
                        self.prompt.info("Conversation deleted");
                    } else {
                        self.prompt.error("Could not delete the conversation");
                    }
                }
                Input::Message(text) => {
                    self.send(text).await;
                }
            }
        }
        self.prompt.close();
        Ok(())
    }

    async fn list(&mut self) {
        let conversations = self.orchestrator.load_conversations().await;
        let active = self.orchestrator.snapshot().active_conversation;
        self.prompt.render_conversations(&conversations, active);
    }

    async fn open(&mut self, id: Uuid) {
        let messages = self.orchestrator.load_messages(id).await;
        if self.orchestrator.snapshot().active_conversation != Some(id) {
            self.prompt.error("Conversation not found");
            return;
        }
        for message in &messages {
            self.prompt.render(message);
        }
    }

    /// Send one message into the active conversation, echoing the answer as it streams
    pub async fn send<C: Into<MessageContent>>(&mut self, content: C) -> SendOutcome {
        let orchestrator = self.orchestrator.clone();
        let active = orchestrator.snapshot().active_conversation;
        let mut updates = orchestrator.subscribe();

        self.prompt.show_busy();
        let send = orchestrator.send_message(content, active);
        tokio::pin!(send);

        let mut shown = 0;
        let outcome = loop {
            tokio::select! {
                outcome = &mut send => break outcome,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break (&mut send).await;
                    }
                    let partial = updates.borrow_and_update().streaming.as_ref().map(Message::text);
                    if let Some(text) = partial {
                        if text.len() > shown {
                            if shown == 0 {
                                self.prompt.hide_busy();
                            }
                            self.prompt.stream_delta(&text[shown..]);
                            shown = text.len();
                        }
                    }
                }
            }
        };
        if shown == 0 {
            self.prompt.hide_busy();
        } else {
            self.prompt.end_stream();
        }

        match outcome {
            SendOutcome::Completed { .. } => {
                let state = orchestrator.snapshot();
                if let Some(answer) = state
                    .messages
                    .last()
                    .filter(|message| message.role == Role::Assistant)
                {
                    self.prompt.render(answer);
                }
            }
            SendOutcome::SignInRequired => self.prompt.info(SIGN_IN_HINT),
            SendOutcome::Busy => self.prompt.error("Still answering the previous message"),
            SendOutcome::Rejected => {}
            SendOutcome::Failed { .. } => self
                .prompt
                .error("Message not sent. Check the chat server and try again."),
        }
        outcome
    }
}

pub async fn run(ctx: &Context, conversation: Option<Uuid>, topic: Option<String>) -> Result<()> {
    let opener = match topic {
        Some(id) => match find_topic(&id) {
            Some(topic) => Some(topic.starter_prompt()),
            None => {
                let known: Vec<&str> = TOPICS.iter().map(|t| t.id).collect();
                bail!("Unknown topic {}. Try one of: {}", id, known.join(", "));
            }
        },
        None => None,
    };

    let orchestrator = ctx.orchestrator()?;
    let mut prompt = CliclackPrompt::new();
    if !ctx.restore_session(&orchestrator).await? {
        prompt.info(SIGN_IN_HINT);
    }
    ChatSession::new(orchestrator, prompt)
        .start(conversation, opener)
        .await
}
