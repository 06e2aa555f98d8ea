//! Stand-in host collaborators for running the assistant from a terminal.

use std::{collections::HashMap, path::Path};

use {
    anyhow::Context,
    async_trait::async_trait,
    parley_channels::{ConversationSource, MessageSink, Permission, PermissionChecker},
    parley_common::types::{Channel, ConversationTurn, InboundMessage, ThreadContext},
    serde::Deserialize,
};

/// Prints replies instead of posting them.
pub struct StdoutSink;

#[async_trait]
impl MessageSink for StdoutSink {
    async fn post_reply(
        &self,
        channel_id: &str,
        thread: &ThreadContext,
        text: &str,
    ) -> parley_channels::Result<()> {
        match thread.root_id.as_deref() {
            Some(root) => println!("[{channel_id} / {root}] {text}"),
            None => println!("[{channel_id}] {text}"),
        }
        Ok(())
    }
}

/// A host with no stored conversations.
pub struct EmptyConversations;

#[async_trait]
impl ConversationSource for EmptyConversations {
    async fn channel_history(
        &self,
        _channel_id: &str,
        _limit: usize,
    ) -> parley_channels::Result<Vec<ConversationTurn>> {
        Ok(Vec::new())
    }

    async fn thread(
        &self,
        _channel_id: &str,
        _root_id: &str,
        _limit: usize,
    ) -> parley_channels::Result<Vec<ConversationTurn>> {
        Ok(Vec::new())
    }
}

/// Team membership read from a JSON object of `team id -> [user id]`.
/// Members of a team hold every team permission.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct TeamRoster {
    teams: HashMap<String, Vec<String>>,
}

impl TeamRoster {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read roster {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse roster {}", path.display()))
    }

    fn is_member(&self, user_id: &str, team_id: &str) -> bool {
        self.teams
            .get(team_id)
            .is_some_and(|members| members.iter().any(|m| m == user_id))
    }
}

#[async_trait]
impl PermissionChecker for TeamRoster {
    async fn user_has_permission_on_team(
        &self,
        user_id: &str,
        team_id: &str,
        _permission: Permission,
    ) -> parley_channels::Result<bool> {
        Ok(self.is_member(user_id, team_id))
    }
}

/// One recorded event: the posted message and the channel it landed in.
#[derive(Debug, Deserialize)]
pub struct RecordedEvent {
    pub message: InboundMessage,
    pub channel: Channel,
}

/// Parse a JSON-lines event log. Blank lines and `#` comments are skipped.
pub fn parse_events(raw: &str) -> anyhow::Result<Vec<RecordedEvent>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str::<RecordedEvent>(line)
                .with_context(|| format!("invalid event on line {}", i + 1))
        })
        .collect()
}
