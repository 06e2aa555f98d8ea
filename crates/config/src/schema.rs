/// Config schema types (generator selection, provider credentials, access
/// restrictions, reply behaviour).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Default username the assistant's bot account is registered under.
pub const DEFAULT_BOT_USERNAME: &str = "ai";

/// Which backend generates replies.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Generator {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai-compatible", alias = "openaicompatible")]
    OpenAiCompatible,
    #[serde(rename = "anthropic")]
    Anthropic,
    /// No backend selected; the assistant stays silent.
    #[default]
    #[serde(rename = "none")]
    None,
}

impl Generator {
    /// All variants, for iteration.
    pub const ALL: &'static [Generator] = &[
        Self::OpenAi,
        Self::OpenAiCompatible,
        Self::Anthropic,
        Self::None,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai-compatible",
            Self::Anthropic => "anthropic",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Generator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "openai" => Ok(Self::OpenAi),
            "openai-compatible" | "openaicompatible" => Ok(Self::OpenAiCompatible),
            "anthropic" => Ok(Self::Anthropic),
            "none" | "" => Ok(Self::None),
            other => Err(format!("unknown generator: {other}")),
        }
    }
}

/// Root configuration.
///
/// A value of this type is an immutable snapshot: updates build a new one
/// and swap it into [`crate::ConfigStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    /// Selected reply backend.
    pub generator: Generator,
    pub bot: BotConfig,
    pub openai: OpenAiConfig,
    pub openai_compatible: OpenAiCompatibleConfig,
    pub anthropic: AnthropicConfig,
    pub access: AccessConfig,
    pub reply: ReplyConfig,
    pub http: HttpConfig,
}

/// The assistant's account as seen by chat users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Username users mention (`@<username>`). Defaults to "ai".
    pub username: String,
    pub display_name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_BOT_USERNAME.into(),
            display_name: "AI Assistant".into(),
        }
    }
}

/// OpenAI credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    /// Default model, e.g. "gpt-4o".
    pub model: String,
    /// Override the API base URL. Defaults to `https://api.openai.com/v1`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o".into(),
            base_url: None,
        }
    }
}

/// Any endpoint speaking the OpenAI Chat Completions API (vLLM, Ollama,
/// LocalAI, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiCompatibleConfig {
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    /// Base URL up to and including the version segment, e.g.
    /// `http://localhost:11434/v1`.
    pub url: String,
    pub model: String,
}

/// Anthropic credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub model: String,
    /// Override the API base URL. Defaults to `https://api.anthropic.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Upper bound on generated tokens; the Messages API requires one.
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-5".into(),
            base_url: None,
            max_tokens: 4096,
        }
    }
}

/// Who may use the assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// When enabled, only members of `allowed_team` get replies.
    pub restrict_usage: bool,
    /// Team whose members may use the assistant.
    pub allowed_team: String,
}

/// Reply assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// Maximum number of prior messages sent as context.
    pub history_limit: usize,
    /// Generic notice posted when the backend fails. `None` keeps the
    /// assistant silent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_notice: Option<String>,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            history_limit: 30,
            failure_notice: None,
        }
    }
}

/// Outbound HTTP settings shared by provider clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Returns the secret when it is present and not blank.
#[must_use]
pub fn non_empty_secret(secret: &Option<Secret<String>>) -> Option<&Secret<String>> {
    secret
        .as_ref()
        .filter(|s| !s.expose_secret().trim().is_empty())
}
