//! Usage restriction: who may talk to the assistant.
//!
//! The guard fails closed. Any doubt (missing team, failed lookup) denies.

use {
    async_trait::async_trait,
    parley_common::types::Channel,
    parley_config::AccessConfig,
    tracing::{debug, warn},
};

use crate::error::Result;

/// Team-scoped permissions the guard asks the host about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// The user can see the team, i.e. is a member of it.
    ViewTeam,
}

impl Permission {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewTeam => "view_team",
        }
    }
}

/// Host-side permission lookup.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn user_has_permission_on_team(
        &self,
        user_id: &str,
        team_id: &str,
        permission: Permission,
    ) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Usage is restricted but no team was configured.
    NoAllowedTeam,
    /// The message was posted in a channel of another team.
    ChannelOutsideTeam { channel_team: String },
    /// The user lacks the permission on the allowed team.
    NotPermitted,
    /// The permission lookup itself failed.
    LookupFailed { message: String },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAllowedTeam => f.write_str("usage is restricted but no team is allowed"),
            Self::ChannelOutsideTeam { channel_team } => {
                write!(f, "channel belongs to team {channel_team}, not the allowed team")
            },
            Self::NotPermitted => f.write_str("user is not on the allowed team"),
            Self::LookupFailed { message } => write!(f, "permission lookup failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    Allow,
    Deny(DenyReason),
}

impl PolicyVerdict {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Decide whether `user_id` may use the assistant from `channel`.
///
/// Unrestricted configurations allow everyone without a lookup. Restricted
/// ones require a non-empty `allowed_team`, a channel that is either teamless
/// (direct or group) or on that team, and a successful `ViewTeam` check.
pub async fn evaluate(
    user_id: &str,
    channel: &Channel,
    access: &AccessConfig,
    checker: &dyn PermissionChecker,
) -> PolicyVerdict {
    if !access.restrict_usage {
        return PolicyVerdict::Allow;
    }

    let team = access.allowed_team.trim();
    if team.is_empty() {
        return PolicyVerdict::Deny(DenyReason::NoAllowedTeam);
    }

    if let Some(channel_team) = channel.team_id.as_deref()
        && channel_team != team
    {
        return PolicyVerdict::Deny(DenyReason::ChannelOutsideTeam {
            channel_team: channel_team.to_string(),
        });
    }

    match checker
        .user_has_permission_on_team(user_id, team, Permission::ViewTeam)
        .await
    {
        Ok(true) => {
            debug!(user_id, team, "user allowed");
            PolicyVerdict::Allow
        },
        Ok(false) => PolicyVerdict::Deny(DenyReason::NotPermitted),
        Err(e) => {
            warn!(user_id, team, error = %e, "permission lookup failed, denying");
            PolicyVerdict::Deny(DenyReason::LookupFailed {
                message: e.to_string(),
            })
        },
    }
}
