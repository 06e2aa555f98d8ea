//! Configuration loading, validation, env substitution, and the live
//! snapshot store.
//!
//! Config files: `parley.toml`, `parley.yaml`, `parley.yml` or `parley.json`,
//! searched in `./` then `~/.config/parley/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all
//! string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod store;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AccessConfig, AnthropicConfig, BotConfig, Generator, HttpConfig, OpenAiCompatibleConfig,
        OpenAiConfig, ParleyConfig, ReplyConfig,
    },
    store::ConfigStore,
    validate::{Diagnostic, Severity, ValidationResult},
};
