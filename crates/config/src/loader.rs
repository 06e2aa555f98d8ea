use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    schema::{Generator, ParleyConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["parley.toml", "parley.yaml", "parley.yml", "parley.json"];

/// Environment variables that override values from the config file.
pub const ENV_GENERATOR: &str = "PARLEY_GENERATOR";
pub const ENV_OPENAI_API_KEY: &str = "PARLEY_OPENAI_API_KEY";
pub const ENV_OPENAI_COMPATIBLE_API_KEY: &str = "PARLEY_OPENAI_COMPATIBLE_API_KEY";
pub const ENV_ANTHROPIC_API_KEY: &str = "PARLEY_ANTHROPIC_API_KEY";

/// Load config from the given path (any supported format).
///
/// `${ENV}` placeholders are substituted before parsing and `PARLEY_*`
/// overrides are applied afterwards.
pub fn load_config(path: &Path) -> anyhow::Result<ParleyConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let config = parse_config(&raw, path)?;
    Ok(apply_env_overrides(config))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./parley.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/parley/parley.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `ParleyConfig::default()` (with env overrides) when no file
/// is found or the file is unreadable.
pub fn discover_and_load() -> ParleyConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    apply_env_overrides(ParleyConfig::default())
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(p) = first_existing(Path::new(".")) {
        return Some(p);
    }
    config_dir().and_then(|dir| first_existing(&dir))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/parley/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "parley").map(|d| d.config_dir().to_path_buf())
}

/// Apply `PARLEY_*` environment overrides on top of a parsed config.
#[must_use]
pub fn apply_env_overrides(config: ParleyConfig) -> ParleyConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

pub(crate) fn apply_env_overrides_with(
    mut config: ParleyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ParleyConfig {
    let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(raw) = lookup(ENV_GENERATOR) {
        match raw.parse::<Generator>() {
            Ok(generator) => config.generator = generator,
            Err(e) => warn!(var = ENV_GENERATOR, error = %e, "ignoring generator override"),
        }
    }
    if let Some(key) = lookup(ENV_OPENAI_API_KEY) {
        config.openai.api_key = Some(Secret::new(key));
    }
    if let Some(key) = lookup(ENV_OPENAI_COMPATIBLE_API_KEY) {
        config.openai_compatible.api_key = Some(Secret::new(key));
    }
    if let Some(key) = lookup(ENV_ANTHROPIC_API_KEY) {
        config.anthropic.api_key = Some(Secret::new(key));
    }
    config
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> anyhow::Result<ParleyConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret};

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "parley.toml",
            "generator = \"openai\"\n[openai]\nmodel = \"gpt-4o-mini\"\n",
        );
        let cfg = parse_config(&std::fs::read_to_string(&path).unwrap(), &path).unwrap();
        assert_eq!(cfg.generator, Generator::OpenAi);
        assert_eq!(cfg.openai.model, "gpt-4o-mini");
    }

    #[test]
    fn loads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "parley.yaml",
            "generator: anthropic\naccess:\n  restrict_usage: true\n  allowed_team: t1\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.generator, Generator::Anthropic);
        assert!(cfg.access.restrict_usage);
        assert_eq!(cfg.access.allowed_team, "t1");
    }

    #[test]
    fn loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "parley.json",
            r#"{"generator": "openaicompatible", "openai_compatible": {"url": "http://localhost:8000/v1", "model": "llama"}}"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.generator, Generator::OpenAiCompatible);
        assert_eq!(cfg.openai_compatible.url, "http://localhost:8000/v1");
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = parse_config("", Path::new("parley.ini")).unwrap_err();
        assert!(err.to_string().contains(".ini"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn env_overrides_replace_keys_and_generator() {
        let lookup = |name: &str| match name {
            ENV_GENERATOR => Some("anthropic".to_string()),
            ENV_ANTHROPIC_API_KEY => Some("sk-env".to_string()),
            ENV_OPENAI_API_KEY => Some("   ".to_string()),
            _ => None,
        };
        let cfg = apply_env_overrides_with(ParleyConfig::default(), lookup);
        assert_eq!(cfg.generator, Generator::Anthropic);
        assert_eq!(
            cfg.anthropic.api_key.as_ref().map(|k| k.expose_secret().as_str()),
            Some("sk-env")
        );
        // blank values are ignored
        assert!(cfg.openai.api_key.is_none());
    }

    #[test]
    fn invalid_generator_override_keeps_file_value() {
        let mut base = ParleyConfig::default();
        base.generator = Generator::OpenAi;
        let cfg = apply_env_overrides_with(base, |name| {
            (name == ENV_GENERATOR).then(|| "gemini".to_string())
        });
        assert_eq!(cfg.generator, Generator::OpenAi);
    }
}
