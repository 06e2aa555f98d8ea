use parley_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The provider answered with a non-success status.
    #[error("{provider} API error HTTP {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Message(String),
}

impl Error {
    pub(crate) fn http(provider: &'static str, source: reqwest::Error) -> Self {
        Self::Http { provider, source }
    }

    /// Whether the failure happened before any response arrived (connect
    /// error, timeout).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Http { .. })
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

parley_common::impl_context!();
