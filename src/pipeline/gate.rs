//! Message gate: decides whether a message gets an answer at all.
//!
//! Direct messages are always answered. Group and room messages are answered
//! only when they contain the summon keyword. Pure string logic, no I/O.

use tracing::debug;

use crate::pipeline::types::{GateDecision, SourceKind};

/// Per-source response gate.
#[derive(Debug, Clone)]
pub struct MessageGate {
    summon_keyword: String,
    strip_keyword: bool,
}

impl MessageGate {
    /// Gate that forwards group text with the keyword left in place.
    pub fn new(summon_keyword: impl Into<String>) -> Self {
        Self {
            summon_keyword: summon_keyword.into(),
            strip_keyword: false,
        }
    }

    /// Remove the summon keyword from forwarded group/room text.
    pub fn with_keyword_stripping(mut self, strip: bool) -> Self {
        self.strip_keyword = strip;
        self
    }

    /// Decide what to do with one message.
    pub fn decide(&self, source_kind: SourceKind, raw_text: &str) -> GateDecision {
        let text = raw_text.trim();

        if !source_kind.is_shared() {
            return GateDecision::Forward(text.to_string());
        }

        if !text.contains(self.summon_keyword.as_str()) {
            debug!(
                source = source_kind.label(),
                "No summon keyword in shared chat; staying silent"
            );
            return GateDecision::Suppress;
        }

        if self.strip_keyword {
            let stripped = text
                .split(self.summon_keyword.as_str())
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            // A bare summon still reaches the model as-is.
            if !stripped.is_empty() {
                return GateDecision::Forward(stripped);
            }
        }

        GateDecision::Forward(text.to_string())
    }
}
