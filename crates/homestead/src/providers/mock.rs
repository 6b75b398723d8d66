use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::models::message::{Message, PromptMessage};
use crate::protocol::TextStream;
use crate::providers::base::{Provider, Usage};

/// A recorded provider call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub system: String,
    pub messages: Vec<PromptMessage>,
    pub streamed: bool,
}

/// A mock provider that returns pre-configured responses for testing and local runs
#[derive(Clone, Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Result<String, String>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new<S: Into<String>>(responses: Vec<S>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(|r| Ok(r.into())).collect(),
            )),
            calls: Arc::default(),
        }
    }

    /// Queue a failure for the next call
    pub fn push_error<S: Into<String>>(&self, error: S) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(error.into()));
        }
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn next(&self, system: &str, messages: &[PromptMessage], streamed: bool) -> Result<String> {
        self.calls
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?
            .push(MockCall {
                system: system.to_string(),
                messages: messages.to_vec(),
                streamed,
            });
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow!("mock provider lock poisoned"))?
            .pop_front();
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(error)) => Err(anyhow!(error)),
            // Return empty response if no more pre-configured responses
            None => Ok(String::new()),
        }
    }
}

/// Split text into word sized deltas, keeping the whitespace
fn deltas(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(String::from).collect()
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[PromptMessage],
    ) -> Result<(Message, Usage)> {
        let text = self.next(system, messages, false)?;
        let usage = Usage::new(
            Some(messages.len() as i32),
            Some(deltas(&text).len() as i32),
            None,
        );
        Ok((Message::assistant(text), usage))
    }

    async fn stream(&self, system: &str, messages: &[PromptMessage]) -> Result<TextStream> {
        let text = self.next(system, messages, true)?;
        Ok(Box::pin(futures::stream::iter(
            deltas(&text).into_iter().map(Ok::<String, anyhow::Error>),
        )))
    }
}
