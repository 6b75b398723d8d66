pub mod assembler;
pub mod auth;
pub mod chat;
pub mod client;
pub mod completion;
pub mod config;
pub mod errors;
pub mod extract;
pub mod models;
pub mod prompt_template;
pub mod protocol;
pub mod providers;
pub mod store;
pub mod topics;
pub mod upload;
