//! Event dispatcher: verifies a webhook delivery and answers its events.
//!
//! Flow per delivery:
//! 1. Signature check (reject everything on mismatch)
//! 2. Parse events
//! 3. Per event: gate → generation → extraction → exactly one reply
//!
//! Join events get the configured welcome text without a generation call.
//! Suppressed and unsupported events produce no reply.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::channels::{ReplySender, SignatureVerifier, parse_events};
use crate::config::BotConfig;
use crate::error::ChannelError;
use crate::llm::{GenerationInvoker, GenerationProvider};
use crate::pipeline::gate::MessageGate;
use crate::pipeline::reply::ReplyExtractor;
use crate::pipeline::types::{
    EventOutcome, GateDecision, InboundEvent, MessageEvent, OutboundReply, ReplyToken,
};

/// Everything the dispatcher needs, built once at startup.
pub struct DispatcherDeps {
    pub verifier: SignatureVerifier,
    pub gate: MessageGate,
    pub invoker: GenerationInvoker,
    pub extractor: ReplyExtractor,
    pub sender: Arc<dyn ReplySender>,
    pub welcome_message: String,
}

/// Stateless across deliveries; safe to share behind an `Arc`.
pub struct EventDispatcher {
    verifier: SignatureVerifier,
    gate: MessageGate,
    invoker: GenerationInvoker,
    extractor: ReplyExtractor,
    sender: Arc<dyn ReplySender>,
    welcome_message: String,
}

impl EventDispatcher {
    pub fn new(deps: DispatcherDeps) -> Self {
        Self {
            verifier: deps.verifier,
            gate: deps.gate,
            invoker: deps.invoker,
            extractor: deps.extractor,
            sender: deps.sender,
            welcome_message: deps.welcome_message,
        }
    }

    /// Wire the pipeline from configuration and the two external collaborators.
    pub fn from_config(
        config: &BotConfig,
        provider: Arc<dyn GenerationProvider>,
        sender: Arc<dyn ReplySender>,
    ) -> Self {
        Self::new(DispatcherDeps {
            verifier: SignatureVerifier::new(config.channel_secret.clone()),
            gate: MessageGate::new(config.summon_keyword.clone())
                .with_keyword_stripping(config.strip_summon_keyword),
            invoker: GenerationInvoker::new(provider)
                .with_system_instruction(config.persona.clone())
                .with_sampling(config.sampling),
            extractor: ReplyExtractor::new(
                config.blocked_fallback.clone(),
                config.failure_fallback.clone(),
            ),
            sender,
            welcome_message: config.welcome_message.clone(),
        })
    }

    /// Handle one webhook delivery.
    ///
    /// Returns `AuthFailed` when the signature does not match; in that case no
    /// event is looked at. Every other problem is absorbed and logged.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature: &str,
    ) -> Result<Vec<EventOutcome>, ChannelError> {
        let span = info_span!("webhook", delivery_id = %Uuid::new_v4());
        async move {
            if !self.verifier.verify(raw_body, signature) {
                warn!(bytes = raw_body.len(), "Rejecting webhook with bad signature");
                return Err(ChannelError::AuthFailed {
                    name: self.sender.name().to_string(),
                    reason: "signature mismatch".into(),
                });
            }

            let events = match parse_events(raw_body) {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = %e, "Verified webhook body did not parse; ignoring");
                    return Ok(Vec::new());
                }
            };

            let mut outcomes = Vec::with_capacity(events.len());
            for event in events {
                outcomes.push(self.handle_event(event).await);
            }
            info!(events = outcomes.len(), "Webhook handled");
            Ok(outcomes)
        }
        .instrument(span)
        .await
    }

    /// Handle a single already-verified event.
    pub async fn handle_event(&self, event: InboundEvent) -> EventOutcome {
        debug!(kind = event.label(), "Dispatching event");
        match event {
            InboundEvent::Message(message) => self.handle_message(message).await,
            InboundEvent::Join { reply_token } => {
                info!("Joined a chat; sending welcome");
                self.deliver(reply_token, self.welcome_message.clone()).await
            }
            InboundEvent::Unsupported { kind } => {
                debug!(kind = %kind, "Ignoring unsupported event");
                EventOutcome::Ignored
            }
        }
    }

    async fn handle_message(&self, message: MessageEvent) -> EventOutcome {
        let age_ms = message
            .age_at(Utc::now())
            .map(|age| age.num_milliseconds());
        let MessageEvent {
            source_kind,
            text,
            reply_token,
            ..
        } = message;

        let prompt = match self.gate.decide(source_kind, &text) {
            GateDecision::Suppress => return EventOutcome::Suppressed,
            GateDecision::Forward(prompt) => prompt,
        };

        info!(
            source = source_kind.label(),
            event_age_ms = age_ms,
            "Forwarding message for generation"
        );
        let result = self.invoker.invoke(&prompt).await;
        let reply_text = self.extractor.to_reply_text(&result);
        self.deliver(reply_token, reply_text).await
    }

    /// Send the event's one reply. Never retried: the token is already spent.
    async fn deliver(&self, reply_token: ReplyToken, text: String) -> EventOutcome {
        let reply = OutboundReply::new(reply_token, text);
        match self.sender.send_reply(reply).await {
            Ok(()) => EventOutcome::Replied,
            Err(e) => {
                error!(channel = self.sender.name(), error = %e, "Reply delivery failed");
                EventOutcome::DeliveryFailed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::{GenerateContentResponse, GenerationRequest};
    use crate::pipeline::reply::{DEFAULT_BLOCKED_FALLBACK, DEFAULT_FAILURE_FALLBACK};

    const SECRET: &str = "test-secret";
    const WELCOME: &str = "welcome!";

    /// Records every reply; optionally fails them all.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send_reply(&self, reply: OutboundReply) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((reply.reply_token.as_str().to_string(), reply.text));
            if self.fail {
                return Err(ChannelError::SendFailed {
                    name: "recording".into(),
                    reason: "Invalid reply token".into(),
                });
            }
            Ok(())
        }
    }

    /// Returns a fixed response and records prompts.
    struct ScriptedProvider {
        response: serde_json::Value,
        fail: bool,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                response: json!({
                    "candidates": [{
                        "content": {"parts": [{"text": text}]},
                        "finishReason": "STOP"
                    }]
                }),
                fail: false,
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn raw(response: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                fail: false,
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: json!({}),
                fail: true,
                prompts: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerateContentResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.prompt.clone());
            if self.fail {
                return Err(LlmError::RequestFailed {
                    provider: "scripted".into(),
                    reason: "quota exceeded".into(),
                });
            }
            Ok(serde_json::from_value(self.response.clone())?)
        }
    }

    fn dispatcher(
        provider: Arc<ScriptedProvider>,
        sender: Arc<RecordingSender>,
    ) -> EventDispatcher {
        EventDispatcher::new(DispatcherDeps {
            verifier: SignatureVerifier::new(SecretString::from(SECRET)),
            gate: MessageGate::new("@miss"),
            invoker: GenerationInvoker::new(provider),
            extractor: ReplyExtractor::default(),
            sender,
            welcome_message: WELCOME.into(),
        })
    }

    fn signed(body: &serde_json::Value) -> (Vec<u8>, String) {
        let bytes = body.to_string().into_bytes();
        let sig = SignatureVerifier::new(SecretString::from(SECRET)).sign(&bytes);
        (bytes, sig)
    }

    fn message(source: &str, text: &str, token: &str) -> serde_json::Value {
        json!({
            "type": "message",
            "replyToken": token,
            "source": {"type": source},
            "message": {"type": "text", "id": "1", "text": text}
        })
    }

    #[tokio::test]
    async fn group_message_without_keyword_is_silent() {
        let provider = ScriptedProvider::replying("unused");
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider.clone(), sender.clone());

        let (body, sig) = signed(&json!({"events": [message("group", "hello", "r1")]}));
        let outcomes = d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(outcomes, vec![EventOutcome::Suppressed]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn group_summon_is_answered_with_generated_text() {
        let provider = ScriptedProvider::replying("I'm fine");
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider.clone(), sender.clone());

        let (body, sig) =
            signed(&json!({"events": [message("group", "@miss how are you", "r1")]}));
        let outcomes = d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(outcomes, vec![EventOutcome::Replied]);
        assert_eq!(*provider.prompts.lock().unwrap(), vec!["@miss how are you"]);
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![("r1".to_string(), "I'm fine".to_string())]
        );
    }

    #[tokio::test]
    async fn direct_message_is_trimmed_and_answered() {
        let provider = ScriptedProvider::replying("hey");
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider.clone(), sender.clone());

        let (body, sig) = signed(&json!({"events": [message("user", "  hi there \n", "r1")]}));
        d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(*provider.prompts.lock().unwrap(), vec!["hi there"]);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_generation_sends_safety_fallback() {
        let provider = ScriptedProvider::raw(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider, sender.clone());

        let (body, sig) = signed(&json!({"events": [message("user", "anything", "r1")]}));
        d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(sender.sent.lock().unwrap()[0].1, DEFAULT_BLOCKED_FALLBACK);
    }

    #[tokio::test]
    async fn textless_normal_stop_sends_failure_fallback() {
        let provider = ScriptedProvider::raw(json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "STOP"}]
        }));
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider, sender.clone());

        let (body, sig) = signed(&json!({"events": [message("user", "anything", "r1")]}));
        d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(sender.sent.lock().unwrap()[0].1, DEFAULT_FAILURE_FALLBACK);
    }

    #[tokio::test]
    async fn failed_generation_sends_failure_fallback() {
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(ScriptedProvider::failing(), sender.clone());

        let (body, sig) = signed(&json!({"events": [message("user", "anything", "r1")]}));
        let outcomes = d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(outcomes, vec![EventOutcome::Replied]);
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].1, DEFAULT_FAILURE_FALLBACK);
        assert!(!sent[0].1.contains("quota"));
    }

    #[tokio::test]
    async fn join_sends_welcome_without_generation() {
        let provider = ScriptedProvider::replying("unused");
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider.clone(), sender.clone());

        let (body, sig) = signed(&json!({"events": [{"type": "join", "replyToken": "rj"}]}));
        let outcomes = d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(outcomes, vec![EventOutcome::Replied]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![("rj".to_string(), WELCOME.to_string())]
        );
    }

    #[tokio::test]
    async fn bad_signature_touches_nothing() {
        let provider = ScriptedProvider::replying("unused");
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider.clone(), sender.clone());

        let (body, sig) = signed(&json!({"events": [message("user", "hi", "r1")]}));
        let mut tampered = body.clone();
        tampered[0] = b' ';

        let err = d.handle_webhook(&tampered, &sig).await.unwrap_err();
        assert!(matches!(err, ChannelError::AuthFailed { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_reported_not_retried() {
        let provider = ScriptedProvider::replying("hello");
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..Default::default()
        });
        let d = dispatcher(provider, sender.clone());

        let (body, sig) = signed(&json!({"events": [message("user", "hi", "r1")]}));
        let outcomes = d.handle_webhook(&body, &sig).await.unwrap();

        assert!(matches!(outcomes[0], EventOutcome::DeliveryFailed(_)));
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mixed_delivery_one_reply_per_answered_event() {
        let provider = ScriptedProvider::replying("ok");
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(provider.clone(), sender.clone());

        let (body, sig) = signed(&json!({"events": [
            message("group", "no summon here", "r1"),
            message("room", "@miss hi", "r2"),
            {"type": "follow", "replyToken": "r3", "source": {"type": "user"}},
            message("user", "hello", "r4"),
            {"type": "join", "replyToken": "r5"}
        ]}));
        let outcomes = d.handle_webhook(&body, &sig).await.unwrap();

        assert_eq!(
            outcomes,
            vec![
                EventOutcome::Suppressed,
                EventOutcome::Replied,
                EventOutcome::Ignored,
                EventOutcome::Replied,
                EventOutcome::Replied,
            ]
        );
        let tokens: Vec<String> = sender
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect();
        assert_eq!(tokens, vec!["r2", "r4", "r5"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn verified_garbage_body_is_absorbed() {
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(ScriptedProvider::replying("x"), sender.clone());

        let body = b"not json".to_vec();
        let sig = SignatureVerifier::new(SecretString::from(SECRET)).sign(&body);
        let outcomes = d.handle_webhook(&body, &sig).await.unwrap();

        assert!(outcomes.is_empty());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verification_ping_is_ok() {
        let sender = Arc::new(RecordingSender::default());
        let d = dispatcher(ScriptedProvider::replying("x"), sender.clone());

        let (body, sig) = signed(&json!({"destination": "U0", "events": []}));
        assert!(d.handle_webhook(&body, &sig).await.unwrap().is_empty());
    }
}
