//! Maps the configured generator to client instances.
//!
//! Resolution runs on every request against the snapshot that request holds,
//! so a configuration change takes effect on the next event without any
//! client being mutated in place. Resolving never touches the network.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    parley_config::{Generator, ParleyConfig, schema::non_empty_secret},
    tracing::debug,
};

use crate::{
    anthropic::{ANTHROPIC_BASE_URL, AnthropicProvider},
    model::{ImageGenerator, LanguageModel},
    openai::{OPENAI_BASE_URL, OpenAiProvider},
};

/// What a generator may be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    LanguageModel,
    ImageGeneration,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LanguageModel => f.write_str("text generation"),
            Self::ImageGeneration => f.write_str("image generation"),
        }
    }
}

/// Why no client could be produced for the current configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unavailable {
    #[error("no generator selected")]
    NotSelected,

    #[error("generator {generator} does not offer {capability}")]
    Unsupported {
        generator: Generator,
        capability: Capability,
    },

    #[error("generator {generator} is missing {setting}")]
    MissingSetting {
        generator: Generator,
        setting: &'static str,
    },
}

pub type LanguageModelFactory =
    Arc<dyn Fn(&ParleyConfig) -> Result<Arc<dyn LanguageModel>, Unavailable> + Send + Sync>;
pub type ImageGeneratorFactory =
    Arc<dyn Fn(&ParleyConfig) -> Result<Arc<dyn ImageGenerator>, Unavailable> + Send + Sync>;

pub struct ProviderRegistry {
    language_models: HashMap<Generator, LanguageModelFactory>,
    image_generators: HashMap<Generator, ImageGeneratorFactory>,
}

impl ProviderRegistry {
    /// A registry with no factories; every lookup is `Unsupported`.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            language_models: HashMap::new(),
            image_generators: HashMap::new(),
        }
    }

    /// OpenAI and OpenAI-compatible offer both capabilities, Anthropic text
    /// only.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register_language_model(Generator::OpenAi, |cfg| {
                Ok(Arc::new(openai_client(cfg)?) as Arc<dyn LanguageModel>)
            })
            .register_language_model(Generator::OpenAiCompatible, |cfg| {
                Ok(Arc::new(compatible_client(cfg)?) as Arc<dyn LanguageModel>)
            })
            .register_language_model(Generator::Anthropic, |cfg| {
                Ok(Arc::new(anthropic_client(cfg)?) as Arc<dyn LanguageModel>)
            })
            .register_image_generator(Generator::OpenAi, |cfg| {
                Ok(Arc::new(openai_client(cfg)?) as Arc<dyn ImageGenerator>)
            })
            .register_image_generator(Generator::OpenAiCompatible, |cfg| {
                Ok(Arc::new(compatible_client(cfg)?) as Arc<dyn ImageGenerator>)
            });
        registry
    }

    /// Install or replace the text factory for a generator.
    pub fn register_language_model(
        &mut self,
        generator: Generator,
        factory: impl Fn(&ParleyConfig) -> Result<Arc<dyn LanguageModel>, Unavailable>
        + Send
        + Sync
        + 'static,
    ) -> &mut Self {
        self.language_models.insert(generator, Arc::new(factory));
        self
    }

    /// Install or replace the image factory for a generator.
    pub fn register_image_generator(
        &mut self,
        generator: Generator,
        factory: impl Fn(&ParleyConfig) -> Result<Arc<dyn ImageGenerator>, Unavailable>
        + Send
        + Sync
        + 'static,
    ) -> &mut Self {
        self.image_generators.insert(generator, Arc::new(factory));
        self
    }

    pub fn resolve_language_model(
        &self,
        config: &ParleyConfig,
    ) -> Result<Arc<dyn LanguageModel>, Unavailable> {
        let factory = lookup(
            &self.language_models,
            config.generator,
            Capability::LanguageModel,
        )?;
        let model = factory(config)?;
        debug!(generator = %config.generator, model = model.id(), "resolved language model");
        Ok(model)
    }

    pub fn resolve_image_generator(
        &self,
        config: &ParleyConfig,
    ) -> Result<Arc<dyn ImageGenerator>, Unavailable> {
        let factory = lookup(
            &self.image_generators,
            config.generator,
            Capability::ImageGeneration,
        )?;
        let generator = factory(config)?;
        debug!(generator = %config.generator, "resolved image generator");
        Ok(generator)
    }

    /// Capabilities the configured generator could offer, ignoring whether
    /// its credentials are complete.
    #[must_use]
    pub fn capabilities(&self, generator: Generator) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.language_models.contains_key(&generator) {
            caps.push(Capability::LanguageModel);
        }
        if self.image_generators.contains_key(&generator) {
            caps.push(Capability::ImageGeneration);
        }
        caps
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn lookup<F>(
    factories: &HashMap<Generator, F>,
    generator: Generator,
    capability: Capability,
) -> Result<&F, Unavailable> {
    factories.get(&generator).ok_or(match generator {
        Generator::None => Unavailable::NotSelected,
        generator => Unavailable::Unsupported {
            generator,
            capability,
        },
    })
}

fn timeout(cfg: &ParleyConfig) -> Duration {
    Duration::from_secs(cfg.http.timeout_secs.max(1))
}

fn openai_client(cfg: &ParleyConfig) -> Result<OpenAiProvider, Unavailable> {
    let key = non_empty_secret(&cfg.openai.api_key).ok_or(Unavailable::MissingSetting {
        generator: Generator::OpenAi,
        setting: "openai.api_key",
    })?;
    let base_url = cfg
        .openai
        .base_url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| OPENAI_BASE_URL.into());
    Ok(
        OpenAiProvider::new(key.clone(), cfg.openai.model.clone(), base_url)
            .with_timeout(timeout(cfg)),
    )
}

fn compatible_client(cfg: &ParleyConfig) -> Result<OpenAiProvider, Unavailable> {
    let section = &cfg.openai_compatible;
    if section.url.trim().is_empty() {
        return Err(Unavailable::MissingSetting {
            generator: Generator::OpenAiCompatible,
            setting: "openai_compatible.url",
        });
    }
    let key = non_empty_secret(&section.api_key).cloned();
    Ok(
        OpenAiProvider::compatible(key, section.url.clone(), section.model.clone())
            .with_timeout(timeout(cfg)),
    )
}

fn anthropic_client(cfg: &ParleyConfig) -> Result<AnthropicProvider, Unavailable> {
    let key = non_empty_secret(&cfg.anthropic.api_key).ok_or(Unavailable::MissingSetting {
        generator: Generator::Anthropic,
        setting: "anthropic.api_key",
    })?;
    let base_url = cfg
        .anthropic
        .base_url
        .clone()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| ANTHROPIC_BASE_URL.into());
    Ok(
        AnthropicProvider::new(key.clone(), cfg.anthropic.model.clone(), base_url)
            .with_max_tokens(cfg.anthropic.max_tokens)
            .with_timeout(timeout(cfg)),
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use {super::*, secrecy::Secret};

    fn config(generator: Generator) -> ParleyConfig {
        let mut cfg = ParleyConfig::default();
        cfg.generator = generator;
        cfg.openai.api_key = Some(Secret::new("sk-openai".into()));
        cfg.anthropic.api_key = Some(Secret::new("sk-ant".into()));
        cfg.openai_compatible.url = "http://localhost:11434/v1".into();
        cfg.openai_compatible.model = "llama3".into();
        cfg
    }

    #[test]
    fn openai_offers_both_capabilities() {
        let registry = ProviderRegistry::with_defaults();
        let cfg = config(Generator::OpenAi);
        let lm = registry.resolve_language_model(&cfg).unwrap();
        assert_eq!(lm.name(), "openai");
        assert_eq!(lm.id(), "gpt-4o");
        assert!(registry.resolve_image_generator(&cfg).is_ok());
    }

    #[test]
    fn compatible_offers_both_capabilities() {
        let registry = ProviderRegistry::with_defaults();
        let cfg = config(Generator::OpenAiCompatible);
        assert_eq!(
            registry.resolve_language_model(&cfg).unwrap().name(),
            "openai-compatible"
        );
        assert!(registry.resolve_image_generator(&cfg).is_ok());
    }

    #[test]
    fn anthropic_has_no_image_generation() {
        let registry = ProviderRegistry::with_defaults();
        let cfg = config(Generator::Anthropic);
        assert_eq!(
            registry.resolve_language_model(&cfg).unwrap().name(),
            "anthropic"
        );
        let err = registry.resolve_image_generator(&cfg).err().unwrap();
        assert_eq!(err, Unavailable::Unsupported {
            generator: Generator::Anthropic,
            capability: Capability::ImageGeneration,
        });
    }

    #[test]
    fn none_selected_resolves_nothing() {
        let registry = ProviderRegistry::with_defaults();
        let cfg = config(Generator::None);
        assert_eq!(
            registry.resolve_language_model(&cfg).err(),
            Some(Unavailable::NotSelected)
        );
        assert_eq!(
            registry.resolve_image_generator(&cfg).err(),
            Some(Unavailable::NotSelected)
        );
    }

    #[test]
    fn missing_key_is_unavailable() {
        let registry = ProviderRegistry::with_defaults();
        let mut cfg = config(Generator::OpenAi);
        cfg.openai.api_key = Some(Secret::new(String::new()));
        assert_eq!(
            registry.resolve_language_model(&cfg).err(),
            Some(Unavailable::MissingSetting {
                generator: Generator::OpenAi,
                setting: "openai.api_key",
            })
        );

        let mut cfg = config(Generator::Anthropic);
        cfg.anthropic.api_key = None;
        assert!(matches!(
            registry.resolve_language_model(&cfg).err(),
            Some(Unavailable::MissingSetting { .. })
        ));
    }

    #[test]
    fn compatible_requires_url_but_not_key() {
        let registry = ProviderRegistry::with_defaults();
        let mut cfg = config(Generator::OpenAiCompatible);
        cfg.openai_compatible.api_key = None;
        assert!(registry.resolve_language_model(&cfg).is_ok());

        cfg.openai_compatible.url = "  ".into();
        assert_eq!(
            registry.resolve_language_model(&cfg).err(),
            Some(Unavailable::MissingSetting {
                generator: Generator::OpenAiCompatible,
                setting: "openai_compatible.url",
            })
        );
    }

    #[test]
    fn dispatch_follows_each_snapshot() {
        let registry = ProviderRegistry::with_defaults();
        let first = registry
            .resolve_language_model(&config(Generator::OpenAi))
            .unwrap();
        let second = registry
            .resolve_language_model(&config(Generator::Anthropic))
            .unwrap();
        assert_eq!(first.name(), "openai");
        assert_eq!(second.name(), "anthropic");
    }

    #[test]
    fn empty_registry_reports_unsupported() {
        let registry = ProviderRegistry::empty();
        assert!(matches!(
            registry.resolve_language_model(&config(Generator::OpenAi)).err(),
            Some(Unavailable::Unsupported {
                capability: Capability::LanguageModel,
                ..
            })
        ));
        assert!(registry.capabilities(Generator::OpenAi).is_empty());
    }

    #[test]
    fn registered_factory_is_called_per_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ProviderRegistry::empty();
        let counter = Arc::clone(&calls);
        registry.register_language_model(Generator::Anthropic, move |cfg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(anthropic_client(cfg)?) as Arc<dyn LanguageModel>)
        });

        let cfg = config(Generator::Anthropic);
        registry.resolve_language_model(&cfg).unwrap();
        registry.resolve_language_model(&cfg).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.capabilities(Generator::Anthropic), vec![
            Capability::LanguageModel
        ]);
    }

    #[test]
    fn unavailable_messages_name_the_problem() {
        let err = Unavailable::MissingSetting {
            generator: Generator::OpenAi,
            setting: "openai.api_key",
        };
        assert_eq!(
            err.to_string(),
            "generator openai is missing openai.api_key"
        );
    }
}
