//! Live configuration shared between the request path and the host's
//! settings hook.
//!
//! Readers take an `Arc` snapshot and never hold the lock while working, so
//! a replacement mid-request cannot tear a request's view of the settings.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::schema::ParleyConfig;

pub struct ConfigStore {
    current: RwLock<Arc<ParleyConfig>>,
}

impl ConfigStore {
    pub fn new(config: ParleyConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// The configuration in force right now. Later replacements do not
    /// affect a snapshot already taken.
    pub fn snapshot(&self) -> Arc<ParleyConfig> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Atomically install a new configuration, returning the previous one.
    pub fn replace(&self, config: ParleyConfig) -> Arc<ParleyConfig> {
        let next = Arc::new(config);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        info!(
            generator = %next.generator,
            restrict_usage = next.access.restrict_usage,
            "configuration replaced"
        );
        std::mem::replace(&mut *guard, next)
    }

    /// Read-modify-write under the write lock, so concurrent updates never
    /// lose each other's changes.
    pub fn update(&self, f: impl FnOnce(&mut ParleyConfig)) -> Arc<ParleyConfig> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let mut next = ParleyConfig::clone(&guard);
        f(&mut next);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(ParleyConfig::default())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("current", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::schema::Generator};

    #[test]
    fn snapshot_survives_replacement() {
        let store = ConfigStore::default();
        let before = store.snapshot();
        let mut next = ParleyConfig::default();
        next.generator = Generator::Anthropic;
        let previous = store.replace(next);

        assert_eq!(before.generator, Generator::None);
        assert_eq!(previous.generator, Generator::None);
        assert_eq!(store.snapshot().generator, Generator::Anthropic);
    }

    #[test]
    fn update_applies_on_top_of_current() {
        let store = ConfigStore::default();
        store.update(|c| c.access.restrict_usage = true);
        store.update(|c| c.access.allowed_team = "team-a".into());
        let cfg = store.snapshot();
        assert!(cfg.access.restrict_usage);
        assert_eq!(cfg.access.allowed_team, "team-a");
    }

    fn paired(generator: Generator, limit: usize) -> ParleyConfig {
        let mut cfg = ParleyConfig::default();
        cfg.generator = generator;
        cfg.reply.history_limit = limit;
        cfg
    }

    #[test]
    fn readers_never_observe_a_torn_config() {
        let store = ConfigStore::new(paired(Generator::OpenAi, 1));

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..500 {
                    if i % 2 == 0 {
                        store.replace(paired(Generator::Anthropic, 2));
                    } else {
                        store.replace(paired(Generator::OpenAi, 1));
                    }
                }
            });
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..500 {
                        let cfg = store.snapshot();
                        let expected = match cfg.generator {
                            Generator::OpenAi => 1,
                            Generator::Anthropic => 2,
                            other => panic!("unexpected generator {other}"),
                        };
                        assert_eq!(cfg.reply.history_limit, expected);
                    }
                });
            }
        });
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let store = ConfigStore::default();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        store.update(|c| c.reply.history_limit += 1);
                    }
                });
            }
        });
        assert_eq!(store.snapshot().reply.history_limit, 30 + 8 * 50);
    }
}
