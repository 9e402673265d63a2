//! Generation invoker: one upstream call, one closed result.
//!
//! Every way the upstream call can go wrong ends up as a [`GenerationResult`]
//! variant. Nothing here returns an error or retries.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::llm::provider::{
    GenerateContentResponse, GenerationProvider, GenerationRequest, SafetySettings,
    SamplingConfig,
};
use crate::pipeline::types::{BlockReason, GenerationResult};

/// Finish reason for a normal stop.
const FINISH_STOP: &str = "STOP";

/// Finish reasons that mean a content filter withheld the output.
const FILTER_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
    "IMAGE_SAFETY",
];

/// Wraps a provider with fixed safety thresholds, sampling and persona.
pub struct GenerationInvoker {
    provider: Arc<dyn GenerationProvider>,
    system_instruction: Option<String>,
    safety_settings: SafetySettings,
    sampling: SamplingConfig,
}

impl GenerationInvoker {
    /// Invoker with permissive safety thresholds and default sampling.
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            system_instruction: None,
            safety_settings: SafetySettings::permissive(),
            sampling: SamplingConfig::default(),
        }
    }

    /// Persona directive sent as the system instruction on every call.
    pub fn with_system_instruction(mut self, persona: impl Into<String>) -> Self {
        let persona = persona.into();
        self.system_instruction = if persona.trim().is_empty() {
            None
        } else {
            Some(persona)
        };
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingConfig) -> Self {
        self.sampling = sampling;
        self
    }

    fn build_request(&self, prompt: &str) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            system_instruction: self.system_instruction.clone(),
            safety_settings: self.safety_settings.clone(),
            sampling: self.sampling,
        }
    }

    /// Call the provider once and classify the outcome.
    pub async fn invoke(&self, prompt: &str) -> GenerationResult {
        let request = self.build_request(prompt);
        debug!(
            model = self.provider.model_name(),
            prompt_chars = prompt.chars().count(),
            "Calling generation provider"
        );

        let result = match self.provider.generate(&request).await {
            Ok(response) => classify(response),
            Err(e) => {
                warn!(
                    model = self.provider.model_name(),
                    error = %e,
                    "Generation call failed"
                );
                GenerationResult::Failed(e.to_string())
            }
        };

        info!(
            model = self.provider.model_name(),
            outcome = result.label(),
            "Generation finished"
        );
        result
    }
}

/// Map a raw upstream response onto the closed result type.
pub fn classify(response: GenerateContentResponse) -> GenerationResult {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let block_reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "none".to_string());
        warn!(block_reason = %block_reason, "No candidates returned; prompt likely filtered");
        return GenerationResult::Empty;
    };

    let finish_reason = candidate.finish_reason.clone();
    let normal_stop = finish_reason.as_deref().is_none_or(|r| r == FINISH_STOP);
    if !normal_stop {
        warn!(
            finish_reason = finish_reason.as_deref().unwrap_or_default(),
            "Candidate stopped abnormally; salvaging any text"
        );
    } else {
        debug!(finish_reason = FINISH_STOP, "Candidate completed normally");
    }

    if let Some(text) = candidate.text() {
        return GenerationResult::Ok(text);
    }

    // Textless candidates count as blocked only when a filter fired.
    match finish_reason.as_deref() {
        Some(code) if FILTER_FINISH_REASONS.contains(&code) => {
            GenerationResult::Blocked(BlockReason::from_code(code))
        }
        Some(code) => GenerationResult::Failed(format!(
            "candidate finished with {code} and no text"
        )),
        None => GenerationResult::Failed("candidate has no text and no finish reason".into()),
    }
}
