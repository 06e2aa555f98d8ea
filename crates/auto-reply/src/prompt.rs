//! Named system-prompt templates.
//!
//! Templates use `{{variable}}` placeholders. Rendering fails on an unknown
//! template or placeholder rather than sending a half-filled prompt.

use std::collections::HashMap;

use {
    chrono::{DateTime, Utc},
    parley_common::{Error, Result, types::ChannelKind},
};

pub const DIRECT_MESSAGE: &str = "direct_message";
pub const MENTION: &str = "mention";

const DEFAULT_DIRECT_MESSAGE: &str = "\
You are {{bot_name}}, a helpful assistant talking one-on-one with a user in a \
chat application. Answer clearly and concisely using Markdown where it helps. \
The current date is {{date}} (UTC).";

const DEFAULT_MENTION: &str = "\
You are {{bot_name}}, a helpful assistant. Someone mentioned you in a \
{{channel_kind}} channel of a chat application; the conversation so far is the \
thread you were mentioned in. Reply to the latest message, keeping in mind that \
other people can read your answer. The current date is {{date}} (UTC).";

/// Values substituted into a template.
#[derive(Debug, Clone)]
pub struct PromptVars {
    pub bot_name: String,
    pub channel_kind: ChannelKind,
    pub now: DateTime<Utc>,
}

impl PromptVars {
    fn get(&self, name: &str) -> Option<String> {
        match name {
            "bot_name" => Some(self.bot_name.clone()),
            "channel_kind" => Some(self.channel_kind.to_string()),
            "date" => Some(self.now.format("%Y-%m-%d").to_string()),
            "time" => Some(self.now.format("%H:%M").to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<String, String>,
}

impl PromptTemplates {
    /// Templates with nothing registered.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// Install or replace a template.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.templates.insert(name.into(), body.into());
        self
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn render(&self, name: &str, vars: &PromptVars) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| Error::UnknownTemplate { name: name.into() })?;

        let mut out = String::with_capacity(template.len() + 64);
        let mut rest = template.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| Error::UnterminatedPlaceholder {
                    template: name.into(),
                })?;
            let key = after[..end].trim();
            let value = vars.get(key).ok_or_else(|| Error::UnknownVariable {
                template: name.into(),
                variable: key.into(),
            })?;
            out.push_str(&value);
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::empty()
            .with_template(DIRECT_MESSAGE, DEFAULT_DIRECT_MESSAGE)
            .with_template(MENTION, DEFAULT_MENTION)
    }
}
