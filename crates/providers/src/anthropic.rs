use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

use crate::{
    error::{Error, Result},
    model::{ChatMessage, CompletionRequest, CompletionResponse, LanguageModel, Usage},
    shared_http_client,
};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Anthropic Messages API client. Text only: Anthropic offers no image
/// generation endpoint.
pub struct AnthropicProvider {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    max_tokens: u32,
    timeout: Duration,
    client: &'static reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: Secret<String>, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens: 4096,
            timeout: DEFAULT_TIMEOUT,
            client: shared_http_client(),
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The Messages API wants strictly alternating roles starting with a user
/// turn. Leading assistant turns are dropped and consecutive same-role turns
/// are merged.
fn to_anthropic_messages(request: &CompletionRequest) -> Vec<serde_json::Value> {
    let mut merged: Vec<(&'static str, String)> = Vec::new();
    for msg in request.conversation() {
        if merged.is_empty() && matches!(msg, ChatMessage::Assistant { .. }) {
            continue;
        }
        match merged.last_mut() {
            Some((role, content)) if *role == msg.role() => {
                content.push_str("\n\n");
                content.push_str(msg.content());
            },
            _ => merged.push((msg.role(), msg.content().to_string())),
        }
    }

    merged
        .into_iter()
        .map(|(role, content)| serde_json::json!({ "role": role, "content": content }))
        .collect()
}

#[async_trait]
impl LanguageModel for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let messages = to_anthropic_messages(request);

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        if let Some(sys) = &request.system_prompt {
            body["system"] = serde_json::Value::String(sys.clone());
        }

        debug!(
            model = %self.model,
            messages_count = messages.len(),
            has_system = request.system_prompt.is_some(),
            "anthropic complete request"
        );
        trace!(body = %body, "anthropic request body");

        let http_resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .timeout(self.timeout)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::http("anthropic", e))?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body_text, "anthropic API error");
            return Err(Error::Api {
                provider: "anthropic",
                status: status.as_u16(),
                body: body_text,
            });
        }

        let resp = http_resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::http("anthropic", e))?;
        trace!(response = %resp, "anthropic raw response");

        let text = resp["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|b| b["type"].as_str() == Some("text"))
            .filter_map(|b| b["text"].as_str())
            .collect::<String>();
        let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());

        let tokens = |key: &str| {
            resp["usage"][key]
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0)
        };

        Ok(CompletionResponse {
            text,
            usage: Usage {
                input_tokens: tokens("input_tokens"),
                output_tokens: tokens("output_tokens"),
            },
        })
    }
}
