pub mod deepl;
pub mod google;
pub mod http;
pub mod libre;
pub mod registry;

pub use deepl::DeepLTranslator;
pub use google::GoogleTranslator;
pub use libre::LibreTranslator;
pub use registry::Registry;

use crate::batch::{excess_length, BatchCodec, BatchPolicy, ChunkPlanner, Payload, RequestPacer};
use crate::config::Backend;
use crate::error::{Result, TranslateError};
use crate::language::{Language, SourceLanguage};
use async_trait::async_trait;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::debug;

/// Optional capability: backends that only support some language pairs.
pub trait DirectionAware: Send + Sync {
    fn check_direction(&self, from: SourceLanguage, to: Language) -> bool;
}

/// Common contract of every translation backend.
///
/// Adapters provide their limit, codec, pacer and the raw `send` step; the
/// batching behavior comes from the provided methods.
#[async_trait]
pub trait Translator: Send + Sync {
    fn backend(&self) -> Backend;

    /// Maximum encoded payload length accepted in one request.
    fn length_limit(&self) -> usize;

    fn codec(&self) -> &dyn BatchCodec;

    fn pacer(&self) -> &RequestPacer;

    fn policy(&self) -> &BatchPolicy;

    /// Send one encoded payload and return the backend's raw translated text.
    async fn send(&self, payload: String, from: SourceLanguage, to: Language) -> Result<String>;

    fn name(&self) -> &'static str {
        self.backend().display_name()
    }

    /// Minimum spacing between consecutive requests.
    fn requests_timeout(&self) -> Duration {
        self.pacer().interval()
    }

    fn supported_languages(&self) -> &'static [&'static str] {
        self.backend().supported_languages()
    }

    fn supports_auto_from(&self) -> bool {
        self.backend().is_supported_auto_from()
    }

    fn direction_aware(&self) -> Option<&dyn DirectionAware> {
        None
    }

    /// By how many characters `payload` exceeds this backend's limit.
    fn check_limit_exceeding(&self, payload: Payload<'_>) -> usize {
        excess_length(payload, self.codec(), self.length_limit())
    }

    /// Fail fast on language pairs this backend cannot serve.
    fn check_languages(&self, from: SourceLanguage, to: Language) -> Result<()> {
        let supported = self.supported_languages();
        match from {
            SourceLanguage::Auto if !self.supports_auto_from() => {
                return Err(TranslateError::AutoNotSupported(self.name()));
            }
            SourceLanguage::Code(lang) if !supported.contains(&lang.code()) => {
                return Err(TranslateError::UnsupportedLanguage {
                    backend: self.name(),
                    code: lang.code().to_string(),
                });
            }
            _ => {}
        }
        if !supported.contains(&to.code()) {
            return Err(TranslateError::UnsupportedLanguage {
                backend: self.name(),
                code: to.code().to_string(),
            });
        }
        if let Some(direction) = self.direction_aware() {
            if !direction.check_direction(from, to) {
                return Err(TranslateError::UnsupportedDirection {
                    backend: self.name(),
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Translate many texts; the result has one slot per input, in order.
    async fn translate_batch(
        &self,
        texts: &[&str],
        from: SourceLanguage,
        to: Language,
    ) -> Result<Vec<Option<String>>> {
        self.check_languages(from, to)?;
        debug!("{}: translating {} text(s) {} -> {}", self.name(), texts.len(), from, to);

        let planner = ChunkPlanner::new(self.codec(), self.length_limit(), self.policy());
        planner
            .run(texts, self.pacer(), |payload| self.send(payload, from, to))
            .await
    }

    /// Translate a single text.
    ///
    /// An undecodable response already fails inside the batch, so an empty
    /// slot here means the call was cancelled or ran out of time.
    async fn translate(&self, text: &str, from: SourceLanguage, to: Language) -> Result<String> {
        let mut results = self.translate_batch(&[text], from, to).await?;
        match results.pop().flatten() {
            Some(translated) => Ok(translated),
            None if self.policy().cancelled.load(Ordering::Relaxed) => Err(TranslateError::Cancelled),
            None => Err(TranslateError::TimedOut(self.policy().timeout)),
        }
    }
}
