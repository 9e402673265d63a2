//! LINE summon bot: answers chat messages with a hosted Gemini model.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod server;
