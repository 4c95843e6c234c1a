use crate::batch::BatchPolicy;
use crate::config::{AdapterOptions, Backend};
use crate::error::{Result, TranslateError};
use crate::translate::{DeepLTranslator, GoogleTranslator, LibreTranslator, Translator};
use std::collections::BTreeMap;

/// Builds a boxed translator from options and a batch policy.
pub type Constructor = fn(AdapterOptions, BatchPolicy) -> Result<Box<dyn Translator>>;

/// Name-to-constructor map of the built-in backends.
pub struct Registry {
    entries: BTreeMap<&'static str, (Backend, Constructor)>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let entries = Backend::ALL
            .into_iter()
            .map(|backend| (backend.name(), (backend, constructor_for(backend))))
            .collect();
        Self { entries }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    pub fn backends(&self) -> impl Iterator<Item = Backend> + '_ {
        self.entries.values().map(|(backend, _)| *backend)
    }

    pub fn get(&self, name: &str) -> Option<Backend> {
        self.entries
            .get(name.to_lowercase().as_str())
            .map(|(backend, _)| *backend)
    }

    pub fn create(
        &self,
        name: &str,
        options: AdapterOptions,
        policy: BatchPolicy,
    ) -> Result<Box<dyn Translator>> {
        let (_, constructor) = self
            .entries
            .get(name.to_lowercase().as_str())
            .ok_or_else(|| {
                TranslateError::Config(format!(
                    "Unknown backend '{}'. Available: {}",
                    name,
                    self.names().collect::<Vec<_>>().join(", ")
                ))
            })?;
        constructor(options, policy)
    }
}

fn constructor_for(backend: Backend) -> Constructor {
    match backend {
        Backend::Google => |options, policy| {
            Ok(Box::new(GoogleTranslator::new(options)?.with_policy(policy)) as Box<dyn Translator>)
        },
        Backend::DeepL => |options, policy| {
            Ok(Box::new(DeepLTranslator::new(options)?.with_policy(policy)) as Box<dyn Translator>)
        },
        Backend::Libre => |options, policy| {
            Ok(Box::new(LibreTranslator::new(options)?.with_policy(policy)) as Box<dyn Translator>)
        },
    }
}
