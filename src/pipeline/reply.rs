//! Response extractor: turns a generation result into reply text.

use crate::pipeline::types::GenerationResult;

/// Default reply when upstream filters withheld the answer.
pub const DEFAULT_BLOCKED_FALLBACK: &str = "這個話題太敏感了，我的安全系統不讓我回答，換個話題吧。";

/// Default reply when the generation call itself failed.
pub const DEFAULT_FAILURE_FALLBACK: &str = "抱歉，我目前腦袋有點打結，等一下再來找我吧。";

/// Maps every [`GenerationResult`] to user-facing text.
#[derive(Debug, Clone)]
pub struct ReplyExtractor {
    blocked_fallback: String,
    failure_fallback: String,
}

impl ReplyExtractor {
    pub fn new(blocked_fallback: impl Into<String>, failure_fallback: impl Into<String>) -> Self {
        Self {
            blocked_fallback: blocked_fallback.into(),
            failure_fallback: failure_fallback.into(),
        }
    }

    pub fn to_reply_text(&self, result: &GenerationResult) -> String {
        match result {
            GenerationResult::Ok(text) => text.clone(),
            GenerationResult::Empty | GenerationResult::Blocked(_) => {
                self.blocked_fallback.clone()
            }
            GenerationResult::Failed(_) => self.failure_fallback.clone(),
        }
    }
}

impl Default for ReplyExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKED_FALLBACK, DEFAULT_FAILURE_FALLBACK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::BlockReason;

    #[test]
    fn ok_text_passes_through_verbatim() {
        let extractor = ReplyExtractor::default();
        let text = extractor.to_reply_text(&GenerationResult::Ok("I'm fine".into()));
        assert_eq!(text, "I'm fine");
    }

    #[test]
    fn empty_and_blocked_share_the_safety_fallback() {
        let extractor = ReplyExtractor::default();
        assert_eq!(
            extractor.to_reply_text(&GenerationResult::Empty),
            DEFAULT_BLOCKED_FALLBACK
        );
        assert_eq!(
            extractor.to_reply_text(&GenerationResult::Blocked(BlockReason::Safety)),
            DEFAULT_BLOCKED_FALLBACK
        );
        assert_eq!(
            extractor.to_reply_text(&GenerationResult::Blocked(BlockReason::Other("X".into()))),
            DEFAULT_BLOCKED_FALLBACK
        );
    }

    #[test]
    fn failure_has_its_own_fallback() {
        let extractor = ReplyExtractor::default();
        let text = extractor.to_reply_text(&GenerationResult::Failed("connection reset".into()));
        assert_eq!(text, DEFAULT_FAILURE_FALLBACK);
        assert!(!text.contains("connection reset"));
    }

    #[test]
    fn every_variant_is_non_empty_and_fallbacks_differ() {
        let extractor = ReplyExtractor::default();
        let results = [
            GenerationResult::Ok("x".into()),
            GenerationResult::Blocked(BlockReason::Recitation),
            GenerationResult::Empty,
            GenerationResult::Failed("boom".into()),
        ];
        for result in &results {
            assert!(!extractor.to_reply_text(result).is_empty(), "{result:?}");
        }
        assert_ne!(
            extractor.to_reply_text(&GenerationResult::Empty),
            extractor.to_reply_text(&GenerationResult::Failed("boom".into()))
        );
    }

    #[test]
    fn custom_fallbacks() {
        let extractor = ReplyExtractor::new("filtered", "errored");
        assert_eq!(extractor.to_reply_text(&GenerationResult::Empty), "filtered");
        assert_eq!(
            extractor.to_reply_text(&GenerationResult::Failed(String::new())),
            "errored"
        );
    }
}
