use {async_trait::async_trait, serde::Serialize};

use crate::error::Result;

// ── Typed chat messages ─────────────────────────────────────────────────────

/// One prior turn of the conversation as seen by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    User { content: String },
    Assistant { content: String },
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::User { content } | Self::Assistant { content } => content,
        }
    }

    /// OpenAI Chat Completions message object.
    #[must_use]
    pub fn to_openai_value(&self) -> serde_json::Value {
        serde_json::json!({ "role": self.role(), "content": self.content() })
    }
}

/// Everything a language model needs to produce one reply.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    /// Earlier turns, oldest first.
    pub history: Vec<ChatMessage>,
    /// The message being answered.
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// History followed by the prompt as a user turn.
    pub fn conversation(&self) -> impl Iterator<Item = ChatMessage> + '_ {
        self.history
            .iter()
            .cloned()
            .chain(std::iter::once(ChatMessage::user(self.prompt.as_str())))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    /// Visible reply text; `None` when the model produced nothing usable.
    pub text: Option<String>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

// ── Images ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub prompt: String,
    /// Provider size string, e.g. "1024x1024".
    pub size: Option<String>,
    pub count: u32,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            size: None,
            count: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedImage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    /// Prompt as rewritten by the provider, when it does so.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

// ── Capabilities ────────────────────────────────────────────────────────────

/// Text generation capability.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name for logs ("openai", "anthropic", ...).
    fn name(&self) -> &str;

    /// Model identifier (e.g. "claude-sonnet-4-5", "gpt-4o").
    fn id(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Image generation capability. Not every generator offers it.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>>;
}

/// Drop `<think>...</think>` reasoning blocks some OpenAI-compatible models
/// emit inline. An unclosed block hides the rest of the text.
#[must_use]
pub fn strip_reasoning(content: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut visible = String::with_capacity(content.len());
    let mut remaining = content;
    while let Some(start) = remaining.find(OPEN) {
        visible.push_str(&remaining[..start]);
        let after_open = &remaining[start + OPEN.len()..];
        match after_open.find(CLOSE) {
            Some(end) => remaining = &after_open[end + CLOSE.len()..],
            None => {
                remaining = "";
                break;
            },
        }
    }
    visible.push_str(remaining);
    visible.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_appends_prompt_as_user_turn() {
        let req = CompletionRequest::new("and now?")
            .with_history(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
        let turns: Vec<_> = req.conversation().collect();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[2], ChatMessage::user("and now?"));
        assert_eq!(turns[1].role(), "assistant");
    }

    #[test]
    fn openai_value_has_role_and_content() {
        let v = ChatMessage::assistant("ok").to_openai_value();
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["content"], "ok");
    }

    #[test]
    fn strip_reasoning_keeps_answer() {
        assert_eq!(strip_reasoning("Hello"), "Hello");
        assert_eq!(
            strip_reasoning("<think>step by step</think>\nThe answer is 42."),
            "The answer is 42."
        );
        assert_eq!(strip_reasoning("a <think>x</think>b<think>y</think> c"), "a b c");
        assert_eq!(strip_reasoning("visible<think>unclosed"), "visible");
        assert_eq!(strip_reasoning("<think>only thoughts</think>"), "");
    }
}
