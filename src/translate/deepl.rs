//! DeepL adapter (`/v2/translate` with HTML tag handling).

use crate::batch::{BatchCodec, BatchPolicy, RequestPacer, TagCodec};
use crate::config::{AdapterOptions, Backend};
use crate::error::{Result, TranslateError};
use crate::language::{Language, SourceLanguage};
use crate::translate::http::{endpoint_or, HttpTransport};
use crate::translate::{DirectionAware, Translator};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const FREE_ENDPOINT: &str = "https://api-free.deepl.com";
const PRO_ENDPOINT: &str = "https://api.deepl.com";

const LENGTH_LIMIT: usize = 5000;

const REQUESTS_TIMEOUT: Duration = Duration::from_millis(1000);

pub const SUPPORTED_LANGUAGES: [&str; 30] = [
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "hu", "id", "it", "ja", "ko",
    "lt", "lv", "nb", "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sv", "tr", "uk", "zh",
];

#[derive(Deserialize, Debug)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Deserialize, Debug)]
struct DeepLTranslation {
    text: String,
}

/// Translator using the DeepL API. Requires an API key.
pub struct DeepLTranslator {
    transport: HttpTransport,
    endpoint: String,
    api_key: String,
    codec: TagCodec,
    pacer: RequestPacer,
    policy: BatchPolicy,
}

impl DeepLTranslator {
    pub fn new(options: AdapterOptions) -> Result<Self> {
        let options = AdapterOptions::defaults().merged(&options);
        let api_key = options
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TranslateError::Config("DeepL requires an API key".to_string()))?;

        // Free-tier keys end with ":fx" and live on a separate host.
        let default_endpoint = if api_key.ends_with(":fx") {
            FREE_ENDPOINT
        } else {
            PRO_ENDPOINT
        };

        Ok(Self {
            transport: HttpTransport::new(&options)?,
            endpoint: endpoint_or(&options, default_endpoint),
            api_key,
            codec: TagCodec::new(),
            pacer: RequestPacer::new(REQUESTS_TIMEOUT),
            policy: BatchPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl DirectionAware for DeepLTranslator {
    fn check_direction(&self, from: SourceLanguage, to: Language) -> bool {
        // DeepL rejects requests whose source and target are the same language.
        match from {
            SourceLanguage::Auto => true,
            SourceLanguage::Code(from) => from != to,
        }
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    fn backend(&self) -> Backend {
        Backend::DeepL
    }

    fn length_limit(&self) -> usize {
        LENGTH_LIMIT
    }

    fn codec(&self) -> &dyn BatchCodec {
        &self.codec
    }

    fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    fn direction_aware(&self) -> Option<&dyn DirectionAware> {
        Some(self)
    }

    async fn send(&self, payload: String, from: SourceLanguage, to: Language) -> Result<String> {
        let url = format!("{}/v2/translate", self.endpoint);
        let target = to.code().to_uppercase();
        let source = match from {
            SourceLanguage::Auto => None,
            SourceLanguage::Code(lang) => Some(lang.code().to_uppercase()),
        };
        debug!("Sending {} chars to {}", payload.chars().count(), url);

        let body = self
            .transport
            .execute(&self.pacer, |client| {
                let mut form = vec![
                    ("text", payload.as_str()),
                    ("target_lang", target.as_str()),
                    ("tag_handling", "html"),
                ];
                if let Some(ref source) = source {
                    form.push(("source_lang", source.as_str()));
                }
                client
                    .post(&url)
                    .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
                    .form(&form)
            })
            .await?;

        let response: DeepLResponse = serde_json::from_str(&body)?;
        response
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| TranslateError::DecodeMismatch("DeepL returned no translations".to_string()))
    }
}
