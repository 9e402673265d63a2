//! Messaging platform I/O.
//!
//! Inbound webhook bodies are verified by `SignatureVerifier` and parsed by
//! `line::parse_events`; replies go out through a `ReplySender`.

pub mod channel;
pub mod line;
pub mod signature;

pub use channel::ReplySender;
pub use line::{LineReplyClient, parse_events};
pub use signature::{SIGNATURE_HEADER, SignatureVerifier};
