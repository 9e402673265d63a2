//! Gemini `generateContent` REST client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::error::LlmError;
use crate::llm::provider::{
    GenerateContentResponse, GenerationProvider, GenerationRequest, SafetySetting,
};

/// Public Gemini API endpoint.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

const PROVIDER: &str = "gemini";

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent<'a>>,
    contents: Vec<WireContent<'a>>,
    safety_settings: &'a [SafetySetting],
    generation_config: WireGenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct WireGenerationConfig {
    temperature: f32,
}

fn wire_request(request: &GenerationRequest) -> WireRequest<'_> {
    WireRequest {
        system_instruction: request.system_instruction.as_deref().map(|text| WireContent {
            role: None,
            parts: vec![WirePart { text }],
        }),
        contents: vec![WireContent {
            role: Some("user"),
            parts: vec![WirePart {
                text: &request.prompt,
            }],
        }],
        safety_settings: request.safety_settings.as_slice(),
        generation_config: WireGenerationConfig {
            temperature: request.sampling.temperature,
        },
    }
}

// ── Provider ────────────────────────────────────────────────────────

/// Gemini over plain HTTPS. One request per call, no retries.
pub struct GeminiProvider {
    api_key: SecretString,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at another host (proxies, local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&wire_request(request))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited {
                provider: PROVIDER.into(),
                retry_after,
            });
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.into(),
            });
        }

        let body = resp.text().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("generateContent returned {status}: {body}"),
            });
        }

        serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })
    }
}
