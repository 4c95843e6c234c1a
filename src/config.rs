use crate::batch::BatchPolicy;
use crate::error::{Result, TranslateError};
use crate::translate::{deepl, google, libre};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Built-in translation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Google,
    DeepL,
    Libre,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Google, Backend::DeepL, Backend::Libre];

    /// Registry key.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Google => "google",
            Backend::DeepL => "deepl",
            Backend::Libre => "libre",
        }
    }

    /// Human-readable name of the service.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Google => "Google Translate",
            Backend::DeepL => "DeepL",
            Backend::Libre => "LibreTranslate",
        }
    }

    pub fn is_required_key(&self) -> bool {
        matches!(self, Backend::DeepL)
    }

    pub fn is_supported_auto_from(&self) -> bool {
        true
    }

    pub fn supported_languages(&self) -> &'static [&'static str] {
        match self {
            Backend::Google => &google::SUPPORTED_LANGUAGES,
            Backend::DeepL => &deepl::SUPPORTED_LANGUAGES,
            Backend::Libre => &libre::SUPPORTED_LANGUAGES,
        }
    }

    fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Backend::Google => None,
            Backend::DeepL => Some("DEEPL_API_KEY"),
            Backend::Libre => Some("LIBRETRANSLATE_API_KEY"),
        }
    }

    fn endpoint_env(&self) -> Option<&'static str> {
        match self {
            Backend::Libre => Some("LIBRETRANSLATE_ENDPOINT"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "google" => Ok(Backend::Google),
            "deepl" => Ok(Backend::DeepL),
            "libre" | "libretranslate" => Ok(Backend::Libre),
            _ => Err(format!(
                "Unknown backend: {}. Use 'google', 'deepl' or 'libre'",
                s
            )),
        }
    }
}

/// Options every adapter recognizes, composed explicitly at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    pub headers: BTreeMap<String, String>,
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    pub max_retries: Option<u32>,
}

impl AdapterOptions {
    /// Defaults shared by all adapters.
    pub fn defaults() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "User-Agent".to_string(),
            format!("translators/{}", env!("CARGO_PKG_VERSION")),
        );
        Self {
            headers,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Combine `self` (defaults) with `overrides`; override values win.
    ///
    /// Headers are merged key by key, ignoring ASCII case of the name.
    pub fn merged(&self, overrides: &AdapterOptions) -> AdapterOptions {
        let mut headers = self.headers.clone();
        for (name, value) in &overrides.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        AdapterOptions {
            headers,
            api_key: overrides.api_key.clone().or_else(|| self.api_key.clone()),
            api_endpoint: overrides
                .api_endpoint
                .clone()
                .or_else(|| self.api_endpoint.clone()),
            max_retries: overrides.max_retries.or(self.max_retries),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub default_backend: Backend,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub send_oversized: bool,
    pub backends: BTreeMap<Backend, AdapterOptions>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_backend: Backend::default(),
            concurrency: 4,
            timeout_secs: 60,
            max_retries: 2,
            send_oversized: false,
            backends: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Read a config file without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<Config>(&contents)?)
    }

    /// Override values from environment-style variables.
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for backend in Backend::ALL {
            if let Some(key) = backend.api_key_env().and_then(&var) {
                self.backends.entry(backend).or_default().api_key = Some(key);
            }
            if let Some(endpoint) = backend.endpoint_env().and_then(&var) {
                self.backends.entry(backend).or_default().api_endpoint = Some(endpoint);
            }
        }
        if let Some(backend) = var("TRANSLATORS_DEFAULT_BACKEND") {
            if let Ok(b) = backend.parse() {
                self.default_backend = b;
            }
        }
        if let Some(concurrency) = var("TRANSLATORS_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                self.concurrency = c;
            }
        }
        if let Some(timeout) = var("TRANSLATORS_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                self.timeout_secs = t;
            }
        }
    }

    pub fn validate(&self, backend: Backend) -> Result<()> {
        if backend.is_required_key() {
            let has_key = self
                .backends
                .get(&backend)
                .and_then(|o| o.api_key.as_ref())
                .is_some_and(|k| !k.trim().is_empty());
            if !has_key {
                let hint = backend.api_key_env().unwrap_or("api_key");
                return Err(TranslateError::Config(format!(
                    "{} requires an API key. Export it with: export {}=...",
                    backend.display_name(),
                    hint
                )));
            }
        }

        if self.concurrency == 0 {
            return Err(TranslateError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(TranslateError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Adapter options for `backend`: crate defaults overlaid with configured values.
    pub fn adapter_options(&self, backend: Backend) -> AdapterOptions {
        let defaults = AdapterOptions {
            max_retries: Some(self.max_retries),
            ..AdapterOptions::defaults()
        };
        match self.backends.get(&backend) {
            Some(configured) => defaults.merged(configured),
            None => defaults,
        }
    }

    pub fn policy(&self) -> BatchPolicy {
        BatchPolicy::default()
            .with_concurrency(self.concurrency)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_send_oversized(self.send_oversized)
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("translators").join("config.toml"))
    }
}
