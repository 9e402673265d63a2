//! Generation provider trait and the request/response shapes it speaks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

// ── Request ─────────────────────────────────────────────────────────

/// Content-safety classification axis of the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HarmCategory {
    #[serde(rename = "HARM_CATEGORY_HATE_SPEECH")]
    HateSpeech,
    #[serde(rename = "HARM_CATEGORY_HARASSMENT")]
    Harassment,
    #[serde(rename = "HARM_CATEGORY_SEXUALLY_EXPLICIT")]
    SexuallyExplicit,
    #[serde(rename = "HARM_CATEGORY_DANGEROUS_CONTENT")]
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        Self::HateSpeech,
        Self::Harassment,
        Self::SexuallyExplicit,
        Self::DangerousContent,
    ];
}

/// Sensitivity at which the upstream service withholds output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HarmBlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

/// One category → threshold entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: HarmBlockThreshold,
}

/// Process-wide safety thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetySettings(Vec<SafetySetting>);

impl SafetySettings {
    /// Every category at the most permissive threshold.
    pub fn permissive() -> Self {
        Self(
            HarmCategory::ALL
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: HarmBlockThreshold::BlockNone,
                })
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[SafetySetting] {
        &self.0
    }

    pub fn threshold_for(&self, category: HarmCategory) -> Option<HarmBlockThreshold> {
        self.0
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.threshold)
    }
}

/// Sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingConfig {
    pub temperature: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { temperature: 1.0 }
    }
}

/// A single-turn generation request. Immutable once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: Option<String>,
    pub safety_settings: SafetySettings,
    pub sampling: SamplingConfig,
}

// ── Response ────────────────────────────────────────────────────────

/// Raw `generateContent` response. Every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

/// One generated alternative.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Candidate {
    /// Concatenated non-thought text parts, `None` when blank.
    pub fn text(&self) -> Option<String> {
        let content = self.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thought: bool,
}

/// Feedback attached when the prompt itself was rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

// ── Provider ────────────────────────────────────────────────────────

/// A hosted text-generation service.
///
/// Implementations own transport only; interpreting the response shape is
/// the invoker's job.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerateContentResponse, LlmError>;
}
