use parley_providers::Unavailable;

/// Why a triggered, authorized request ended without a reply.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error("loading conversation context failed: {0}")]
    Context(#[source] parley_channels::Error),

    #[error("rendering system prompt failed: {0}")]
    Prompt(#[source] parley_common::Error),

    #[error("language model call failed: {0}")]
    Provider(#[source] parley_providers::Error),

    #[error("language model returned an empty completion")]
    EmptyCompletion,

    #[error("posting reply failed: {0}")]
    Delivery(#[source] parley_channels::Error),
}

impl Failure {
    /// Failures the user should hear about. Host-side problems stay silent.
    #[must_use]
    pub fn caused_by_provider(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::EmptyCompletion)
    }
}

/// Error from a direct generation call (`ask`, `generate_image`).
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Unavailable(#[from] Unavailable),

    #[error(transparent)]
    Provider(#[from] parley_providers::Error),
}

pub type Result<T> = std::result::Result<T, GenerationError>;
