//! Inbound event pipeline.
//!
//! Every verified webhook event flows through:
//! 1. `MessageGate::decide()`: answer at all? (pure, no I/O)
//! 2. `GenerationInvoker::invoke()`: one upstream call, closed result
//! 3. `ReplyExtractor::to_reply_text()`: text or a fixed fallback
//! 4. `ReplySender::send_reply()`: exactly one reply per answered event
//!
//! `EventDispatcher` drives the steps; join events skip straight to step 4.

pub mod dispatcher;
pub mod gate;
pub mod reply;
pub mod types;

pub use dispatcher::{DispatcherDeps, EventDispatcher};
pub use gate::MessageGate;
pub use reply::ReplyExtractor;
pub use types::*;
