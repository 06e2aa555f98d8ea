//! Inbound message processing pipeline, the glue between the chat host and
//! the language model.
//!
//! Flow: inbound post → trigger detection → usage restriction → provider
//! resolution → context + system prompt → completion → reply via the host's
//! message sink.

pub mod assistant;
pub mod error;
pub mod processor;
pub mod prompt;

pub use {
    assistant::Assistant,
    error::{Failure, GenerationError, Result},
    processor::{IgnoreReason, Outcome, RequestProcessor},
    prompt::{PromptTemplates, PromptVars},
};
