//! These models represent the objects passed between the front end, the chat server,
//! the hosted store and the model providers.
//!
//! The same shapes travel over several wire formats:
//! - chat requests sent from the front end to `/api/chat`
//! - rows in the hosted `conversations` and `messages` tables
//! - provider specific message lists sent to the LLM
//!
//! We always convert into these internal structs at the edges, so the provider and
//! storage encodings live next to the code that speaks them.
pub mod content;
pub mod conversation;
pub mod message;
pub mod role;
