//! One inbound event in, exactly one [`Outcome`] out.
//!
//! Flow: filter own/automated posts → classify → authorize → resolve the
//! language model → load context and render the prompt → complete → post.

use std::sync::Arc;

use {
    chrono::Utc,
    parley_channels::{
        ConversationSource, DenyReason, MessageSink, PermissionChecker, PolicyVerdict,
        TriggerDecision, classify, evaluate,
    },
    parley_common::types::{BotIdentity, Channel, ConversationTurn, InboundMessage, ThreadContext},
    parley_config::ParleyConfig,
    parley_providers::{ChatMessage, CompletionRequest, ProviderRegistry, Unavailable},
    tracing::{debug, error, info, warn},
};

use crate::{
    error::Failure,
    prompt::{self, PromptTemplates, PromptVars},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    OwnMessage,
    AutomatedAuthor,
    NotAddressed,
}

/// Terminal state of one inbound event.
#[derive(Debug)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Rejected(DenyReason),
    Unconfigured(Unavailable),
    Replied { trigger: TriggerDecision },
    Failed(Failure),
}

impl Outcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored(_) => "ignored",
            Self::Rejected(_) => "rejected",
            Self::Unconfigured(_) => "unconfigured",
            Self::Replied { .. } => "replied",
            Self::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct RequestProcessor {
    bot_user_id: String,
    registry: Arc<ProviderRegistry>,
    permissions: Arc<dyn PermissionChecker>,
    sink: Arc<dyn MessageSink>,
    conversations: Arc<dyn ConversationSource>,
    prompts: PromptTemplates,
}

impl RequestProcessor {
    pub fn new(
        bot_user_id: impl Into<String>,
        registry: Arc<ProviderRegistry>,
        permissions: Arc<dyn PermissionChecker>,
        sink: Arc<dyn MessageSink>,
        conversations: Arc<dyn ConversationSource>,
    ) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            registry,
            permissions,
            sink,
            conversations,
            prompts: PromptTemplates::default(),
        }
    }

    #[must_use]
    pub fn with_prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    /// Process one posted message against a configuration snapshot.
    pub async fn handle(
        &self,
        message: &InboundMessage,
        channel: &Channel,
        config: &ParleyConfig,
    ) -> Outcome {
        let bot = BotIdentity::new(self.bot_user_id.as_str(), config.bot.username.as_str());

        if message.author_id == bot.user_id {
            return Outcome::Ignored(IgnoreReason::OwnMessage);
        }
        if message.author_is_bot {
            debug!(author_id = %message.author_id, "ignoring automated author");
            return Outcome::Ignored(IgnoreReason::AutomatedAuthor);
        }

        let trigger = classify(message, channel, &bot);
        if !trigger.is_triggered() {
            return Outcome::Ignored(IgnoreReason::NotAddressed);
        }

        let thread = reply_thread(message, trigger);
        let thread_id = thread.root_id.as_deref().unwrap_or("");

        if let PolicyVerdict::Deny(reason) = evaluate(
            &message.author_id,
            channel,
            &config.access,
            self.permissions.as_ref(),
        )
        .await
        {
            warn!(
                channel_id = %message.channel_id,
                user_id = %message.author_id,
                reason = %reason,
                "request rejected"
            );
            return Outcome::Rejected(reason);
        }

        let model = match self.registry.resolve_language_model(config) {
            Ok(model) => model,
            Err(reason) => {
                error!(
                    channel_id = %message.channel_id,
                    generator = %config.generator,
                    reason = %reason,
                    "no language model available"
                );
                return Outcome::Unconfigured(reason);
            },
        };

        let request = match self.build_request(message, channel, trigger, &bot, config).await {
            Ok(request) => request,
            Err(failure) => return self.fail(message, &thread, failure, config).await,
        };

        debug!(
            channel_id = %message.channel_id,
            thread_id,
            trigger = %trigger,
            provider = model.name(),
            model = model.id(),
            history = request.history.len(),
            "invoking language model"
        );

        let text = match model.complete(&request).await {
            Ok(resp) => match resp.text {
                Some(text) if !text.trim().is_empty() => text,
                _ => {
                    return self
                        .fail(message, &thread, Failure::EmptyCompletion, config)
                        .await;
                },
            },
            Err(e) => {
                return self
                    .fail(message, &thread, Failure::Provider(e), config)
                    .await;
            },
        };

        if let Err(e) = self.sink.post_reply(&message.channel_id, &thread, &text).await {
            return self
                .fail(message, &thread, Failure::Delivery(e), config)
                .await;
        }

        info!(
            channel_id = %message.channel_id,
            thread_id,
            trigger = %trigger,
            "reply posted"
        );
        Outcome::Replied { trigger }
    }

    async fn build_request(
        &self,
        message: &InboundMessage,
        channel: &Channel,
        trigger: TriggerDecision,
        bot: &BotIdentity,
        config: &ParleyConfig,
    ) -> Result<CompletionRequest, Failure> {
        let limit = config.reply.history_limit;
        let turns = if limit == 0 {
            Vec::new()
        } else {
            // One extra in case the source includes the triggering post.
            let fetch = limit.saturating_add(1);
            let fetched = match trigger {
                TriggerDecision::DirectMessage => {
                    self.conversations
                        .channel_history(&message.channel_id, fetch)
                        .await
                },
                _ => {
                    self.conversations
                        .thread(&message.channel_id, message.thread_root(), fetch)
                        .await
                },
            };
            fetched.map_err(Failure::Context)?
        };

        let template = match trigger {
            TriggerDecision::DirectMessage => prompt::DIRECT_MESSAGE,
            _ => prompt::MENTION,
        };
        let vars = PromptVars {
            bot_name: config.bot.display_name.clone(),
            channel_kind: channel.kind,
            now: Utc::now(),
        };
        let system_prompt = self
            .prompts
            .render(template, &vars)
            .map_err(Failure::Prompt)?;

        Ok(CompletionRequest::new(message.text.as_str())
            .with_system_prompt(system_prompt)
            .with_history(to_history(turns, &message.id, &bot.user_id, limit)))
    }

    async fn fail(
        &self,
        message: &InboundMessage,
        thread: &ThreadContext,
        failure: Failure,
        config: &ParleyConfig,
    ) -> Outcome {
        warn!(
            channel_id = %message.channel_id,
            thread_id = thread.root_id.as_deref().unwrap_or(""),
            error = %failure,
            "request failed"
        );

        if failure.caused_by_provider()
            && let Some(notice) = config.reply.failure_notice.as_deref()
            && !notice.trim().is_empty()
            && let Err(e) = self.sink.post_reply(&message.channel_id, thread, notice).await
        {
            warn!(channel_id = %message.channel_id, error = %e, "failed to post failure notice");
        }

        Outcome::Failed(failure)
    }
}

/// Mentions are answered in the thread they came from (starting one when
/// needed). Direct messages are answered in place.
fn reply_thread(message: &InboundMessage, trigger: TriggerDecision) -> ThreadContext {
    match (trigger, message.root_id.as_deref()) {
        (TriggerDecision::DirectMessage, None) => ThreadContext::top_level(),
        (TriggerDecision::DirectMessage, Some(root)) => ThreadContext::in_thread(root),
        _ => ThreadContext::in_thread(message.thread_root()),
    }
}

/// Map host turns to model turns: bot posts become assistant turns, the
/// triggering post and blank posts are dropped, the newest `limit` are kept.
fn to_history(
    turns: Vec<ConversationTurn>,
    message_id: &str,
    bot_user_id: &str,
    limit: usize,
) -> Vec<ChatMessage> {
    let mut history: Vec<ChatMessage> = turns
        .into_iter()
        .filter(|t| t.id != message_id && !t.text.trim().is_empty())
        .map(|t| {
            if t.author_id == bot_user_id {
                ChatMessage::assistant(t.text)
            } else {
                ChatMessage::user(t.text)
            }
        })
        .collect();
    if history.len() > limit {
        history.drain(..history.len() - limit);
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(root: Option<&str>) -> InboundMessage {
        InboundMessage {
            id: "p9".into(),
            author_id: "u1".into(),
            channel_id: "c1".into(),
            root_id: root.map(str::to_string),
            text: "hi".into(),
            author_is_bot: false,
        }
    }

    #[test]
    fn mention_replies_in_thread() {
        assert_eq!(
            reply_thread(&message(None), TriggerDecision::Mentioned),
            ThreadContext::in_thread("p9")
        );
        assert_eq!(
            reply_thread(&message(Some("p1")), TriggerDecision::Mentioned),
            ThreadContext::in_thread("p1")
        );
    }

    #[test]
    fn direct_message_replies_in_place() {
        assert_eq!(
            reply_thread(&message(None), TriggerDecision::DirectMessage),
            ThreadContext::top_level()
        );
        assert_eq!(
            reply_thread(&message(Some("p1")), TriggerDecision::DirectMessage),
            ThreadContext::in_thread("p1")
        );
    }

    #[test]
    fn history_maps_roles_and_trims_oldest() {
        let turns = vec![
            ConversationTurn::new("p1", "u1", "first"),
            ConversationTurn::new("p2", "bot", "answer"),
            ConversationTurn::new("p3", "u1", "   "),
            ConversationTurn::new("p4", "u2", "second"),
            ConversationTurn::new("p9", "u1", "hi"),
        ];
        let history = to_history(turns, "p9", "bot", 2);
        assert_eq!(history, vec![
            ChatMessage::assistant("answer"),
            ChatMessage::user("second"),
        ]);
    }

    #[test]
    fn outcome_names() {
        assert_eq!(Outcome::Ignored(IgnoreReason::NotAddressed).to_string(), "ignored");
        assert_eq!(
            Outcome::Replied {
                trigger: TriggerDecision::Mentioned
            }
            .as_str(),
            "replied"
        );
    }
}
