//! LibreTranslate adapter.

use crate::batch::{BatchCodec, BatchPolicy, RequestPacer, TagCodec};
use crate::config::{AdapterOptions, Backend};
use crate::error::{Result, TranslateError};
use crate::language::{Language, SourceLanguage};
use crate::translate::http::{endpoint_or, HttpTransport};
use crate::translate::Translator;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://libretranslate.com";

const LENGTH_LIMIT: usize = 5000;

const REQUESTS_TIMEOUT: Duration = Duration::from_millis(1000);

pub const SUPPORTED_LANGUAGES: [&str; 30] = [
    "ar", "az", "bg", "bn", "ca", "cs", "da", "de", "el", "en", "eo", "es", "et", "fa", "fi", "fr",
    "ga", "he", "hi", "hu", "id", "it", "ja", "ko", "nl", "pl", "pt", "ru", "uk", "zh",
];

#[derive(Serialize)]
struct LibreRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct LibreResponse {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
    error: Option<String>,
}

/// Translator for a LibreTranslate instance (public or self-hosted).
pub struct LibreTranslator {
    transport: HttpTransport,
    endpoint: String,
    api_key: Option<String>,
    codec: TagCodec,
    pacer: RequestPacer,
    policy: BatchPolicy,
}

impl LibreTranslator {
    pub fn new(options: AdapterOptions) -> Result<Self> {
        let options = AdapterOptions::defaults().merged(&options);
        Ok(Self {
            transport: HttpTransport::new(&options)?,
            endpoint: endpoint_or(&options, DEFAULT_ENDPOINT),
            api_key: options.api_key.clone(),
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

#[async_trait]
impl Translator for LibreTranslator {
    fn backend(&self) -> Backend {
        Backend::Libre
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

    async fn send(&self, payload: String, from: SourceLanguage, to: Language) -> Result<String> {
        let url = format!("{}/translate", self.endpoint);
        let request = LibreRequest {
            q: &payload,
            source: from.code(),
            target: to.code(),
            format: "html",
            api_key: self.api_key.as_deref(),
        };
        debug!("Sending {} chars to {}", payload.chars().count(), url);

        let body = self
            .transport
            .execute(&self.pacer, |client| client.post(&url).json(&request))
            .await?;

        let response: LibreResponse = serde_json::from_str(&body)?;
        if let Some(error) = response.error {
            return Err(TranslateError::Api {
                status: 200,
                message: error,
            });
        }
        response
            .translated_text
            .ok_or_else(|| TranslateError::DecodeMismatch("LibreTranslate returned no text".to_string()))
    }
}
