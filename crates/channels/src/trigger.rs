//! Decides whether a posted message is addressed to the assistant.
//!
//! Classification is a pure function of the message, its channel and the
//! bot's identity: no I/O, no configuration beyond the username.

use parley_common::types::{BotIdentity, Channel, ChannelKind, InboundMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    NotTriggered,
    /// Posted in a one-to-one channel the bot belongs to.
    DirectMessage,
    /// Posted elsewhere with an `@<bot>` mention.
    Mentioned,
}

impl TriggerDecision {
    #[must_use]
    pub fn is_triggered(self) -> bool {
        !matches!(self, Self::NotTriggered)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotTriggered => "not_triggered",
            Self::DirectMessage => "direct_message",
            Self::Mentioned => "mentioned",
        }
    }
}

impl std::fmt::Display for TriggerDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The literal users type to summon the bot.
#[must_use]
pub fn mention_token(username: &str) -> String {
    format!("@{username}")
}

/// Characters that may continue a username after the token.
fn continues_username(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Whether `text` mentions `username` as a whole token.
///
/// Matching is case-sensitive. `@ai,` `(@ai)` and `@ai.` count; `@aibot`,
/// `@ai-helper`, `@ai.bot` and `me@ai` do not.
#[must_use]
pub fn contains_mention(text: &str, username: &str) -> bool {
    if username.is_empty() {
        return false;
    }
    let token = mention_token(username);

    text.match_indices(&token).any(|(start, _)| {
        let before_ok = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());

        let mut after = text[start + token.len()..].chars();
        let after_ok = match after.next() {
            None => true,
            Some('.') => !after.next().is_some_and(continues_username),
            Some(c) => !continues_username(c),
        };

        before_ok && after_ok
    })
}

/// Whether `channel` is a direct conversation that includes the bot.
#[must_use]
pub fn is_direct_with(channel: &Channel, bot_user_id: &str) -> bool {
    channel.kind == ChannelKind::Direct
        && !bot_user_id.is_empty()
        && channel.name.contains(bot_user_id)
}

/// Classify one inbound message. Self-authored messages never trigger.
#[must_use]
pub fn classify(message: &InboundMessage, channel: &Channel, bot: &BotIdentity) -> TriggerDecision {
    if message.author_id == bot.user_id {
        return TriggerDecision::NotTriggered;
    }
    if is_direct_with(channel, &bot.user_id) {
        return TriggerDecision::DirectMessage;
    }
    if contains_mention(&message.text, &bot.username) {
        return TriggerDecision::Mentioned;
    }
    TriggerDecision::NotTriggered
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn bot() -> BotIdentity {
        BotIdentity::new("bot9", "ai")
    }

    fn msg(author: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: "p1".into(),
            author_id: author.into(),
            channel_id: "c1".into(),
            text: text.into(),
            ..Default::default()
        }
    }

    fn town_square() -> Channel {
        Channel::team("c1", ChannelKind::Public, "town-square", "team1")
    }

    #[rstest]
    #[case("hey @ai, hello", true)]
    #[case("@ai", true)]
    #[case("@ai what's up?", true)]
    #[case("ask (@ai) later", true)]
    #[case("thanks @ai.", true)]
    #[case("thanks @ai...", true)]
    #[case("cc:@ai", true)]
    #[case("hey @aisomething", false)]
    #[case("hey @ai_bot", false)]
    #[case("hey @ai-helper", false)]
    #[case("ping @ai.bot", false)]
    #[case("mail me@ai", false)]
    #[case("hey @AI", false)]
    #[case("hey ai", false)]
    #[case("@aibot but also @ai", true)]
    fn mention_boundaries(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(contains_mention(text, "ai"), expected, "{text:?}");
    }

    #[test]
    fn empty_username_never_matches() {
        assert!(!contains_mention("@ hello", ""));
    }

    #[test]
    fn handles_multibyte_neighbours() {
        assert!(contains_mention("«@ai» ça va", "ai"));
        assert!(!contains_mention("é@ai", "ai"));
    }

    #[test]
    fn self_authored_never_triggers() {
        let channel = Channel::direct("dm", "user1", "bot9");
        assert_eq!(
            classify(&msg("bot9", "@ai echo"), &channel, &bot()),
            TriggerDecision::NotTriggered
        );
    }

    #[test]
    fn direct_channel_with_bot_triggers() {
        let channel = Channel::direct("dm", "user1", "bot9");
        assert_eq!(
            classify(&msg("user1", "no mention here"), &channel, &bot()),
            TriggerDecision::DirectMessage
        );
    }

    #[test]
    fn direct_channel_without_bot_needs_mention() {
        let channel = Channel::direct("dm", "user1", "user2");
        assert_eq!(
            classify(&msg("user1", "hello"), &channel, &bot()),
            TriggerDecision::NotTriggered
        );
        assert_eq!(
            classify(&msg("user1", "hello @ai"), &channel, &bot()),
            TriggerDecision::Mentioned
        );
    }

    #[test]
    fn group_channel_named_like_bot_is_not_direct() {
        let channel = Channel {
            id: "g".into(),
            kind: ChannelKind::Group,
            name: "user1__bot9__user2".into(),
            team_id: None,
        };
        assert_eq!(
            classify(&msg("user1", "hi"), &channel, &bot()),
            TriggerDecision::NotTriggered
        );
    }

    #[test]
    fn mention_in_team_channel() {
        assert_eq!(
            classify(&msg("user1", "hey @ai, hello"), &town_square(), &bot()),
            TriggerDecision::Mentioned
        );
        assert_eq!(
            classify(&msg("user1", "hey @aisomething"), &town_square(), &bot()),
            TriggerDecision::NotTriggered
        );
    }

    #[test]
    fn classify_is_idempotent() {
        let m = msg("user1", "@ai twice");
        let first = classify(&m, &town_square(), &bot());
        for _ in 0..3 {
            assert_eq!(classify(&m, &town_square(), &bot()), first);
        }
    }

    #[test]
    fn decision_names() {
        assert!(TriggerDecision::Mentioned.is_triggered());
        assert!(!TriggerDecision::NotTriggered.is_triggered());
        assert_eq!(TriggerDecision::DirectMessage.to_string(), "direct_message");
    }
}
