//! Chat-platform types shared by the trigger detector, the policy guard and
//! the request processor.
//!
//! These mirror what the host platform hands the core for every posted
//! message. None of them are persisted by the core.

use serde::{Deserialize, Serialize};

/// Separator the host uses when encoding the two members of a direct-message
/// channel into its name (`"<user_a>__<user_b>"`).
pub const DIRECT_CHANNEL_SEPARATOR: &str = "__";

/// Kind of channel a message was posted in.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// One-to-one conversation.
    Direct,
    /// Multi-party conversation outside any team.
    Group,
    /// Team channel anyone on the team can join.
    #[default]
    Public,
    /// Invite-only team channel.
    Private,
}

impl ChannelKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The channel an inbound message belongs to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub kind: ChannelKind,
    /// Membership encoding. For direct channels this holds both member ids
    /// joined by [`DIRECT_CHANNEL_SEPARATOR`].
    #[serde(default)]
    pub name: String,
    /// Owning team; `None` for direct and group channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl Channel {
    /// Build a direct channel between two users, encoded the way the host does.
    #[must_use]
    pub fn direct(id: impl Into<String>, user_a: &str, user_b: &str) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Direct,
            name: format!("{user_a}{DIRECT_CHANNEL_SEPARATOR}{user_b}"),
            team_id: None,
        }
    }

    /// Build a team channel.
    #[must_use]
    pub fn team(
        id: impl Into<String>,
        kind: ChannelKind,
        name: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            team_id: Some(team_id.into()),
        }
    }
}

/// One posted chat message as delivered by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub author_id: String,
    pub channel_id: String,
    /// Root post of the thread this message replies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
    #[serde(default)]
    pub text: String,
    /// Set when the author is an automated account (another bot, an
    /// integration, a webhook).
    #[serde(default)]
    pub author_is_bot: bool,
}

impl InboundMessage {
    /// Thread a reply to this message should land in: the existing thread
    /// root, or the message itself when it starts a new thread.
    #[must_use]
    pub fn thread_root(&self) -> &str {
        self.root_id.as_deref().unwrap_or(&self.id)
    }
}

/// The assistant's own account on the host platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
    pub username: String,
}

impl BotIdentity {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
        }
    }
}

/// Where a reply is posted inside a channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadContext {
    /// Root post id; `None` posts at the channel's top level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<String>,
}

impl ThreadContext {
    #[must_use]
    pub fn top_level() -> Self {
        Self { root_id: None }
    }

    #[must_use]
    pub fn in_thread(root_id: impl Into<String>) -> Self {
        Self {
            root_id: Some(root_id.into()),
        }
    }
}

/// A prior message in the conversation, used as model context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    /// Post id, used to drop the triggering message from its own context.
    pub id: String,
    pub author_id: String,
    pub text: String,
}

impl ConversationTurn {
    pub fn new(
        id: impl Into<String>,
        author_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author_id: author_id.into(),
            text: text.into(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn direct_channel_encodes_both_members() {
        let channel = Channel::direct("dm1", "user1", "bot9");
        assert_eq!(channel.kind, ChannelKind::Direct);
        assert_eq!(channel.name, "user1__bot9");
        assert!(channel.team_id.is_none());
    }

    #[test]
    fn thread_root_falls_back_to_message_id() {
        let mut msg = InboundMessage {
            id: "p1".into(),
            ..Default::default()
        };
        assert_eq!(msg.thread_root(), "p1");
        msg.root_id = Some("p0".into());
        assert_eq!(msg.thread_root(), "p0");
    }

    #[rstest]
    #[case(r#""direct""#, ChannelKind::Direct)]
    #[case(r#""group""#, ChannelKind::Group)]
    #[case(r#""public""#, ChannelKind::Public)]
    #[case(r#""private""#, ChannelKind::Private)]
    fn channel_kind_uses_lowercase_names(#[case] json: &str, #[case] kind: ChannelKind) {
        let parsed: ChannelKind = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(serde_json::to_string(&kind).unwrap(), json);
    }

    #[test]
    fn inbound_message_defaults_optional_fields() {
        let msg: InboundMessage = serde_json::from_str(
            r#"{"id": "p1", "author_id": "u1", "channel_id": "c1", "text": "hi"}"#,
        )
        .unwrap();
        assert!(!msg.author_is_bot);
        assert!(msg.root_id.is_none());
    }
}
