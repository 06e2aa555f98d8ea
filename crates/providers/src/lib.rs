//! LLM provider clients and the generator registry.

pub mod anthropic;
pub mod error;
pub mod model;
pub mod openai;
pub mod registry;

pub use {
    error::{Error, Result},
    model::{
        ChatMessage, CompletionRequest, CompletionResponse, GeneratedImage, ImageGenerator,
        ImageRequest, LanguageModel, Usage,
    },
    registry::{Capability, ProviderRegistry, Unavailable},
};

/// Shared HTTP client for provider calls.
///
/// Clients reuse one connection pool; per-call timeouts are set on each
/// request from the active configuration.
pub fn shared_http_client() -> &'static reqwest::Client {
    static CLIENT: std::sync::LazyLock<reqwest::Client> =
        std::sync::LazyLock::new(reqwest::Client::new);
    &CLIENT
}
