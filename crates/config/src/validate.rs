//! Configuration validation engine.
//!
//! Detects unknown or misspelled fields in TOML files and reports settings
//! that would leave the assistant unable to reply.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    env_subst::substitute_env_with,
    loader::{apply_env_overrides_with, parse_config},
    schema::{Generator, ParleyConfig, non_empty_secret},
};

/// History limits above this are almost certainly a typo and would send
/// whole channels as context.
const MAX_SENSIBLE_HISTORY: usize = 1_000;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "credentials",
    /// "access", "bot", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "openai.api_key"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(
        severity: Severity,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

/// Mirrors every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        ("generator", Leaf),
        (
            "bot",
            Struct(HashMap::from([("username", Leaf), ("display_name", Leaf)])),
        ),
        (
            "openai",
            Struct(HashMap::from([
                ("api_key", Leaf),
                ("model", Leaf),
                ("base_url", Leaf),
            ])),
        ),
        (
            "openai_compatible",
            Struct(HashMap::from([
                ("api_key", Leaf),
                ("url", Leaf),
                ("model", Leaf),
            ])),
        ),
        (
            "anthropic",
            Struct(HashMap::from([
                ("api_key", Leaf),
                ("model", Leaf),
                ("base_url", Leaf),
                ("max_tokens", Leaf),
            ])),
        ),
        (
            "access",
            Struct(HashMap::from([
                ("restrict_usage", Leaf),
                ("allowed_team", Leaf),
            ])),
        ),
        (
            "reply",
            Struct(HashMap::from([
                ("history_limit", Leaf),
                ("failure_notice", Leaf),
            ])),
        ),
        ("http", Struct(HashMap::from([("timeout_secs", Leaf)]))),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_len = b.chars().count();
    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_len]
}

/// Closest candidate within `max_distance`, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    candidates
        .iter()
        .map(|&c| (c, levenshtein(needle, c)))
        .filter(|&(_, d)| d > 0 && d <= max_distance)
        .min_by_key(|&(_, d)| d)
        .map(|(c, _)| c)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
///
/// `${ENV}` placeholders and `PARLEY_*` overrides are resolved from the
/// process environment, matching what the loader would produce.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Info,
                "file-ref",
                "",
                "no config file found; using defaults",
            )],
            config_path: None,
        };
    };

    let lookup = |name: &str| std::env::var(name).ok();
    let mut result = match std::fs::read_to_string(&actual_path) {
        Ok(content) => validate_str_with(&content, &actual_path, lookup),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(
                Severity::Error,
                "syntax",
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without touching the filesystem or environment.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    validate_str_with(toml_str, Path::new("parley.toml"), |_| None)
}

fn validate_str_with(
    raw: &str,
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> ValidationResult {
    let mut diagnostics = Vec::new();
    let raw = substitute_env_with(raw, &lookup);

    // Unknown-field detection works on the TOML tree; other formats rely on
    // the type check below.
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_none_or(|e| e == "toml");
    if is_toml {
        match toml::from_str::<toml::Value>(&raw) {
            Ok(value) => check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics),
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "syntax",
                    "",
                    format!("TOML syntax error: {e}"),
                ));
                return ValidationResult {
                    diagnostics,
                    config_path: None,
                };
            },
        }
    }

    match parse_config(&raw, path) {
        Ok(config) => {
            let config = apply_env_overrides_with(config, &lookup);
            check_semantics(&config, &mut diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic::new(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        )),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Walk the TOML value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let message = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field (did you mean \"{s}\"?)"),
            None => "unknown field".to_string(),
        };
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "unknown-field",
            path,
            message,
        ));
    }
}

/// Settings that parse but leave the assistant silent or misbehaving.
fn check_semantics(config: &ParleyConfig, diagnostics: &mut Vec<Diagnostic>) {
    match config.generator {
        Generator::OpenAi => {
            if non_empty_secret(&config.openai.api_key).is_none() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "credentials",
                    "openai.api_key",
                    "generator is \"openai\" but no API key is set",
                ));
            }
        },
        Generator::OpenAiCompatible => {
            if config.openai_compatible.url.trim().is_empty() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "credentials",
                    "openai_compatible.url",
                    "generator is \"openai-compatible\" but no endpoint URL is set",
                ));
            }
            if config.openai_compatible.model.trim().is_empty() {
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    "credentials",
                    "openai_compatible.model",
                    "no model set; the endpoint must pick a default",
                ));
            }
        },
        Generator::Anthropic => {
            if non_empty_secret(&config.anthropic.api_key).is_none() {
                diagnostics.push(Diagnostic::new(
                    Severity::Error,
                    "credentials",
                    "anthropic.api_key",
                    "generator is \"anthropic\" but no API key is set",
                ));
            }
        },
        Generator::None => diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "credentials",
            "generator",
            "no generator selected; the assistant will not reply",
        )),
    }

    if config.access.restrict_usage && config.access.allowed_team.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "access",
            "access.allowed_team",
            "usage is restricted but no team is allowed; every request will be rejected",
        ));
    }

    let username = &config.bot.username;
    if username.is_empty() || username.starts_with('@') || username.contains(char::is_whitespace)
    {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "bot",
            "bot.username",
            "username must be non-empty, without a leading '@' or whitespace",
        ));
    }

    if config.reply.history_limit > MAX_SENSIBLE_HISTORY {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "reply",
            "reply.history_limit",
            format!(
                "history limit {} is above {MAX_SENSIBLE_HISTORY}; large contexts are slow and costly",
                config.reply.history_limit
            ),
        ));
    }

    if config.reply.history_limit == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "reply",
            "reply.history_limit",
            "history limit is 0; only the triggering message is sent as context",
        ));
    }

    if config.http.timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "http",
            "http.timeout_secs",
            "timeout must be at least one second",
        ));
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(result: &'a ValidationResult, path: &str) -> Option<&'a Diagnostic> {
        result.diagnostics.iter().find(|d| d.path == path)
    }

    #[test]
    fn levenshtein_distances() {
        assert_eq!(levenshtein("openai", "openai"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("anthropic", "anthrpic"), 1);
        assert_eq!(levenshtein("acess", "access"), 1);
    }

    #[test]
    fn suggest_returns_none_for_distant() {
        assert_eq!(suggest("zzzzzzzz", &["access", "reply"], 3), None);
        assert_eq!(suggest("repyl", &["access", "reply"], 3), Some("reply"));
    }

    #[test]
    fn unknown_top_level_key_with_suggestion() {
        let result = validate_toml_str("generator = \"none\"\n[acess]\nrestrict_usage = true\n");
        let d = find(&result, "acess").unwrap();
        assert_eq!(d.category, "unknown-field");
        assert_eq!(d.severity, Severity::Error);
        assert!(d.message.contains("access"), "{}", d.message);
    }

    #[test]
    fn unknown_nested_key_with_suggestion() {
        let result = validate_toml_str("[openai]\napi_kye = \"x\"\n");
        let d = find(&result, "openai.api_kye").unwrap();
        assert!(d.message.contains("api_key"));
    }

    #[test]
    fn syntax_error_detected() {
        let result = validate_toml_str("generator = \n");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn unknown_generator_is_type_error() {
        let result = validate_toml_str("generator = \"gemini\"\n");
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[test]
    fn missing_openai_key_is_error() {
        let result = validate_toml_str("generator = \"openai\"\n");
        let d = find(&result, "openai.api_key").unwrap();
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn env_supplied_key_satisfies_credentials() {
        let result = validate_str_with(
            "generator = \"anthropic\"\n",
            Path::new("parley.toml"),
            |name| (name == "PARLEY_ANTHROPIC_API_KEY").then(|| "sk".to_string()),
        );
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn compatible_requires_url() {
        let result = validate_toml_str("generator = \"openaicompatible\"\n");
        assert!(find(&result, "openai_compatible.url").is_some());
    }

    #[test]
    fn restricted_without_team_warned() {
        let toml = "generator = \"none\"\n[access]\nrestrict_usage = true\n";
        let result = validate_toml_str(toml);
        let d = find(&result, "access.allowed_team").unwrap();
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn huge_history_limit_warned() {
        let result = validate_toml_str("[reply]\nhistory_limit = 5000\n");
        let d = find(&result, "reply.history_limit").unwrap();
        assert_eq!(d.severity, Severity::Warning);
        assert!(d.message.contains("5000"));
    }

    #[test]
    fn bad_bot_username_is_error() {
        let result = validate_toml_str("[bot]\nusername = \"@ai\"\n");
        assert!(find(&result, "bot.username").is_some());
    }

    #[test]
    fn yaml_file_skips_toml_checks() {
        let result = validate_str_with(
            "generator: openai\nopenai:\n  api_key: sk\n",
            Path::new("parley.yaml"),
            |_| None,
        );
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn valid_config_has_no_errors() {
        let toml = r#"
generator = "openai"

[bot]
username = "ai"

[openai]
api_key = "sk-123"
model = "gpt-4o"

[access]
restrict_usage = true
allowed_team = "team-1"

[reply]
history_limit = 10
failure_notice = "Sorry, something went wrong."

[http]
timeout_secs = 30
"#;
        let result = validate_toml_str(toml);
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn validate_missing_file_reports_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parley.toml");
        let result = validate(Some(&path));
        assert!(result.has_errors());
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
    }
}
