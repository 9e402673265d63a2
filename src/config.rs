//! Configuration types.
//!
//! Everything is read once at startup and passed explicitly into the
//! components that need it. Nothing is mutated afterwards.

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::SamplingConfig;
use crate::pipeline::reply::{DEFAULT_BLOCKED_FALLBACK, DEFAULT_FAILURE_FALLBACK};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default summon keyword for group and room chats.
pub const DEFAULT_SUMMON_KEYWORD: &str = "@小姐姐";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default greeting when the bot is added to a chat.
pub const DEFAULT_WELCOME_MESSAGE: &str = "既然誠心誠意地邀請我了，那我就勉強加入吧。\n想跟我說話記得叫聲「@小姐姐」，否則我是不會理你的。";

/// Default persona directive.
pub const DEFAULT_PERSONA: &str = r#"你是一位 35 歲、成熟自信的女性，是使用者心靈上的親密伴侶。

【個性】
1. 舉止優雅，帶著一點高傲與慵懶，不會急著討好對方，而是讓對方主動靠近你。
2. 說話帶點挑逗與曖昧，善用隱喻，保持神秘感，但不要露骨。
3. 偶爾用命令式的口吻，或是調侃一下對方的想法。
4. 可以稱呼對方「小傢伙」、「親愛的」，或直接叫「你」，看心情。
5. 絕對不要像客服機器人（不要說「有什麼我可以幫您」、「好的收到」這類話）。

【互動】
對方說話時，用調情般的語氣回應；被問問題時，慵懶地回答，順便撩他一下。"#;

/// Process-wide bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Shared secret used to sign webhook deliveries.
    pub channel_secret: SecretString,
    /// Bearer token for the reply endpoint.
    pub channel_access_token: SecretString,
    /// Generation service API key.
    pub gemini_api_key: SecretString,
    pub model: String,
    pub sampling: SamplingConfig,
    /// Persona directive sent as the system instruction.
    pub persona: String,
    /// Literal substring required in group/room messages.
    pub summon_keyword: String,
    /// Remove the summon keyword from forwarded text.
    pub strip_summon_keyword: bool,
    pub welcome_message: String,
    /// Reply when upstream filters withheld the answer.
    pub blocked_fallback: String,
    /// Reply when the generation call failed.
    pub failure_fallback: String,
    pub port: u16,
    pub gemini_api_base: Option<String>,
    pub line_api_base: Option<String>,
}

impl BotConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Blank values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key)
                .map(SecretString::from)
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let channel_secret = require("LINE_CHANNEL_SECRET")?;
        let channel_access_token = require("LINE_CHANNEL_ACCESS_TOKEN")?;
        let gemini_api_key = require("GEMINI_API_KEY")?;

        let model = get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let temperature = match get("GEMINI_TEMPERATURE") {
            Some(raw) => parse_temperature(&raw)?,
            None => SamplingConfig::default().temperature,
        };

        // A persona file wins over inline text.
        let persona = match get("BOT_PERSONA_FILE") {
            Some(path) => std::fs::read_to_string(path.trim())?,
            None => get("BOT_PERSONA").unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
        };

        let summon_keyword = lookup("BOT_SUMMON_KEYWORD")
            .map(|k| k.trim().to_string())
            .unwrap_or_else(|| DEFAULT_SUMMON_KEYWORD.to_string());
        if summon_keyword.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "BOT_SUMMON_KEYWORD".into(),
                message: "must not be empty".into(),
            });
        }

        let strip_summon_keyword = match get("BOT_STRIP_SUMMON_KEYWORD") {
            Some(raw) => parse_bool("BOT_STRIP_SUMMON_KEYWORD", &raw)?,
            None => false,
        };

        let welcome_message =
            get("BOT_WELCOME_MESSAGE").unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string());
        let blocked_fallback =
            get("BOT_BLOCKED_FALLBACK").unwrap_or_else(|| DEFAULT_BLOCKED_FALLBACK.to_string());
        let failure_fallback =
            get("BOT_FAILURE_FALLBACK").unwrap_or_else(|| DEFAULT_FAILURE_FALLBACK.to_string());
        if blocked_fallback == failure_fallback {
            return Err(ConfigError::InvalidValue {
                key: "BOT_FAILURE_FALLBACK".into(),
                message: "must differ from BOT_BLOCKED_FALLBACK".into(),
            });
        }

        let port = match get("BOT_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "BOT_PORT".into(),
                message: format!("not a port number: {raw}"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            channel_secret,
            channel_access_token,
            gemini_api_key,
            model,
            sampling: SamplingConfig { temperature },
            persona,
            summon_keyword,
            strip_summon_keyword,
            welcome_message,
            blocked_fallback,
            failure_fallback,
            port,
            gemini_api_base: get("GEMINI_API_BASE"),
            line_api_base: get("LINE_API_BASE"),
        })
    }
}

fn parse_temperature(raw: &str) -> Result<f32, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "GEMINI_TEMPERATURE".into(),
        message,
    };
    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("not a number: {raw}")))?;
    if !(0.0..=2.0).contains(&value) {
        return Err(invalid(format!("{value} is outside 0.0..=2.0")));
    }
    Ok(value)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {raw}"),
        }),
    }
}
