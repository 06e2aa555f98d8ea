//! Host-facing entry point tying the live configuration to the processor.

use std::sync::Arc;

use {
    parley_common::types::{Channel, InboundMessage},
    parley_config::{ConfigStore, ParleyConfig},
    parley_providers::{CompletionRequest, GeneratedImage, ImageRequest},
    tracing::{debug, info},
};

use crate::{
    error::Result,
    processor::{Outcome, RequestProcessor},
};

/// Host-facing entry point: owns the live configuration and routes every
/// event through the processor against a fresh snapshot.
pub struct Assistant {
    store: Arc<ConfigStore>,
    processor: RequestProcessor,
}

impl Assistant {
    pub fn new(store: Arc<ConfigStore>, processor: RequestProcessor) -> Self {
        Self { store, processor }
    }

    /// The configuration the next event will see.
    pub fn config(&self) -> Arc<ParleyConfig> {
        self.store.snapshot()
    }

    /// Handle one posted message. The snapshot is taken once, so a
    /// configuration change mid-request does not affect this event.
    pub async fn on_message(&self, message: &InboundMessage, channel: &Channel) -> Outcome {
        let config = self.store.snapshot();
        let outcome = self.processor.handle(message, channel, &config).await;
        debug!(
            message_id = %message.id,
            channel_id = %message.channel_id,
            outcome = %outcome,
            "event handled"
        );
        outcome
    }

    /// Install settings saved by the host.
    pub fn on_configuration_change(&self, config: ParleyConfig) {
        let previous = self.store.replace(config);
        info!(previous_generator = %previous.generator, "assistant reconfigured");
    }

    /// One-off completion outside any conversation.
    pub async fn ask(&self, prompt: &str) -> Result<Option<String>> {
        let config = self.store.snapshot();
        let model = self.processor.registry().resolve_language_model(&config)?;
        let response = model.complete(&CompletionRequest::new(prompt)).await?;
        Ok(response.text)
    }

    /// Generate images with the configured generator, if it offers that.
    pub async fn generate_image(&self, request: &ImageRequest) -> Result<Vec<GeneratedImage>> {
        let config = self.store.snapshot();
        let generator = self.processor.registry().resolve_image_generator(&config)?;
        debug!(provider = generator.name(), "generating image");
        Ok(generator.generate(request).await?)
    }
}
