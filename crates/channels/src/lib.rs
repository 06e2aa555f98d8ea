//! Inbound-message triage for the assistant.
//!
//! `trigger` decides whether a posted message is addressed to the bot,
//! `gating` decides whether its author may use it, and `sink` holds the
//! traits the host implements to deliver replies and conversation context.

pub mod error;
pub mod gating;
pub mod sink;
pub mod trigger;

pub use {
    error::{Error, Result},
    gating::{DenyReason, Permission, PermissionChecker, PolicyVerdict, evaluate},
    sink::{ConversationSource, MessageSink},
    trigger::{TriggerDecision, classify, contains_mention, mention_token},
};
