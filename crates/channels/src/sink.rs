use {
    async_trait::async_trait,
    parley_common::types::{ConversationTurn, ThreadContext},
};

use crate::error::Result;

/// Posts the assistant's replies back to the host.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn post_reply(&self, channel_id: &str, thread: &ThreadContext, text: &str)
    -> Result<()>;
}

/// Reads earlier messages for model context.
///
/// Both methods return at most `limit` turns, oldest first. The triggering
/// message may or may not be included.
#[async_trait]
pub trait ConversationSource: Send + Sync {
    /// Most recent messages of a channel, used for direct conversations.
    async fn channel_history(&self, channel_id: &str, limit: usize)
    -> Result<Vec<ConversationTurn>>;

    /// Root post and replies of a thread.
    async fn thread(
        &self,
        channel_id: &str,
        root_id: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>>;
}
