//! OpenAI Chat Completions and Images clients.
//!
//! The same client serves any OpenAI-compatible endpoint (vLLM, Ollama,
//! LocalAI); only the base URL, the optional key and the provider name differ.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

use crate::{
    error::{Context, Error, Result},
    model::{
        CompletionRequest, CompletionResponse, GeneratedImage, ImageGenerator, ImageRequest,
        LanguageModel, Usage, strip_reasoning,
    },
    shared_http_client,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Image model used when talking to OpenAI itself.
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiProvider {
    api_key: Option<Secret<String>>,
    model: String,
    image_model: Option<String>,
    base_url: String,
    provider_name: &'static str,
    timeout: Duration,
    client: &'static reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: Secret<String>, model: String, base_url: String) -> Self {
        Self {
            api_key: Some(api_key),
            model,
            image_model: Some(DEFAULT_IMAGE_MODEL.into()),
            base_url: trim_base(base_url),
            provider_name: "openai",
            timeout: DEFAULT_TIMEOUT,
            client: shared_http_client(),
        }
    }

    /// Client for a self-hosted endpoint. Many local servers run without a
    /// key; the configured model also serves image requests.
    pub fn compatible(api_key: Option<Secret<String>>, url: String, model: String) -> Self {
        let image_model = (!model.is_empty()).then(|| model.clone());
        Self {
            api_key,
            model,
            image_model,
            base_url: trim_base(url),
            provider_name: "openai-compatible",
            timeout: DEFAULT_TIMEOUT,
            client: shared_http_client(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .post(format!("{}{path}", self.base_url))
            .timeout(self.timeout)
            .header("content-type", "application/json");
        match &self.api_key {
            Some(key) => req.header(
                "Authorization",
                format!("Bearer {}", key.expose_secret()),
            ),
            None => req,
        }
    }

    async fn send(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        trace!(body = %body, provider = self.provider_name, "openai request body");

        let http_resp = self
            .post(path)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::http(self.provider_name, e))?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(
                status = %status,
                model = %self.model,
                provider = self.provider_name,
                body = %body_text,
                "openai API error"
            );
            return Err(Error::Api {
                provider: self.provider_name,
                status: status.as_u16(),
                body: body_text,
            });
        }

        let resp = http_resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| Error::http(self.provider_name, e))?;
        trace!(response = %resp, "openai raw response");
        Ok(resp)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn build_chat_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if let Some(system) = &request.system_prompt {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    messages.extend(request.conversation().map(|m| m.to_openai_value()));

    let mut body = serde_json::json!({ "messages": messages });
    if !model.is_empty() {
        body["model"] = serde_json::Value::String(model.to_string());
    }
    body
}

fn parse_usage(usage: &serde_json::Value) -> Usage {
    let field = |name: &str| {
        usage[name]
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };
    Usage {
        input_tokens: field("prompt_tokens"),
        output_tokens: field("completion_tokens"),
    }
}

#[async_trait]
impl LanguageModel for OpenAiProvider {
    fn name(&self) -> &str {
        self.provider_name
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let body = build_chat_body(&self.model, request);
        debug!(
            model = %self.model,
            provider = self.provider_name,
            history = request.history.len(),
            has_system = request.system_prompt.is_some(),
            "openai complete request"
        );

        let resp = self.send("/chat/completions", &body).await?;

        let text = resp["choices"][0]["message"]["content"]
            .as_str()
            .map(strip_reasoning)
            .filter(|s| !s.is_empty());

        Ok(CompletionResponse {
            text,
            usage: parse_usage(&resp["usage"]),
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiProvider {
    fn name(&self) -> &str {
        self.provider_name
    }

    async fn generate(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>> {
        let mut body = serde_json::json!({
            "prompt": request.prompt,
            "n": request.count.max(1),
        });
        if let Some(model) = &self.image_model {
            body["model"] = serde_json::Value::String(model.clone());
        }
        if let Some(size) = &request.size {
            body["size"] = serde_json::Value::String(size.clone());
        }
        debug!(
            provider = self.provider_name,
            count = request.count,
            size = request.size.as_deref().unwrap_or("default"),
            "openai image request"
        );

        let resp = self.send("/images/generations", &body).await?;
        let data = resp["data"]
            .as_array()
            .context("image response has no data array")?;

        let text = |item: &serde_json::Value, key: &str| item[key].as_str().map(str::to_string);
        Ok(data
            .iter()
            .map(|item| GeneratedImage {
                url: text(item, "url"),
                b64_json: text(item, "b64_json"),
                revised_prompt: text(item, "revised_prompt"),
            })
            .filter(|img| img.url.is_some() || img.b64_json.is_some())
            .collect())
    }
}
