//! Google Translate adapter using the public `translate_a` endpoint.

use crate::batch::{BatchCodec, BatchPolicy, RequestPacer, TagCodec};
use crate::config::{AdapterOptions, Backend};
use crate::error::{Result, TranslateError};
use crate::language::{Language, SourceLanguage};
use crate::translate::http::{endpoint_or, HttpTransport};
use crate::translate::Translator;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com";

/// Maximum encoded payload length per request.
const LENGTH_LIMIT: usize = 5000;

/// Minimum spacing between requests.
const REQUESTS_TIMEOUT: Duration = Duration::from_millis(500);

pub const SUPPORTED_LANGUAGES: [&str; 50] = [
    "af", "ar", "az", "be", "bg", "bn", "ca", "cs", "cy", "da", "de", "el", "en", "eo", "es", "et",
    "fa", "fi", "fr", "ga", "he", "hi", "hr", "hu", "hy", "id", "is", "it", "ja", "ka", "kk", "ko",
    "lt", "lv", "ms", "nb", "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sr", "sv", "th", "tr", "uk",
    "vi", "zh",
];

/// Translator backed by Google Translate's HTML-aware endpoint.
pub struct GoogleTranslator {
    transport: HttpTransport,
    endpoint: String,
    codec: TagCodec,
    pacer: RequestPacer,
    policy: BatchPolicy,
}

impl GoogleTranslator {
    pub fn new(options: AdapterOptions) -> Result<Self> {
        let options = AdapterOptions::defaults().merged(&options);
        Ok(Self {
            transport: HttpTransport::new(&options)?,
            endpoint: endpoint_or(&options, DEFAULT_ENDPOINT),
            codec: TagCodec::new(),
            pacer: RequestPacer::new(REQUESTS_TIMEOUT),
            policy: BatchPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pull the translated text out of the response array.
    ///
    /// The endpoint answers `["text"]` for an explicit source language and
    /// `[["text", "detected"]]` when asked to detect it.
    fn parse_response(body: &str) -> Result<String> {
        let value: Value = serde_json::from_str(body)?;
        let first = value
            .as_array()
            .and_then(|items| items.first())
            .ok_or_else(|| TranslateError::DecodeMismatch("empty Google response".to_string()))?;

        let text = match first {
            Value::String(text) => Some(text.as_str()),
            Value::Array(pair) => pair.first().and_then(Value::as_str),
            _ => None,
        };

        text.map(str::to_string)
            .ok_or_else(|| TranslateError::DecodeMismatch(format!("unexpected Google response: {}", body)))
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn backend(&self) -> Backend {
        Backend::Google
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
        let url = format!("{}/translate_a/t", self.endpoint);
        debug!("Sending {} chars to {}", payload.chars().count(), url);

        let body = self
            .transport
            .execute(&self.pacer, |client| {
                client
                    .post(&url)
                    .query(&[
                        ("client", "gtx"),
                        ("sl", from.code()),
                        ("tl", to.code()),
                        ("format", "html"),
                    ])
                    .form(&[("q", payload.as_str())])
            })
            .await?;

        Self::parse_response(&body)
    }
}
