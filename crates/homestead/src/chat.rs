//! Chat session orchestration.
//!
//! The [`Orchestrator`] drives one turn at a time per conversation: it appends the
//! user's message, persists it, asks the completion backend for an answer, streams
//! that answer into [`ChatState::streaming`] and finally swaps it for the
//! persisted assistant message. Front ends observe the session through
//! [`Orchestrator::subscribe`].
mod orchestrator;
mod state;

pub use orchestrator::{Orchestrator, SendOutcome, TITLE_PROMPT};
pub use state::{ChatState, TurnSlot};
