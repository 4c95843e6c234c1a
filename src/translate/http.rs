//! Shared HTTP plumbing for the backend adapters.

use crate::batch::RequestPacer;
use crate::config::AdapterOptions;
use crate::error::{Result, TranslateError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for a single HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Retries used when the options do not say otherwise.
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 500;

/// A `reqwest` client with the adapter's merged headers and retry policy.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(options: &AdapterOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TranslateError::Config(format!("Invalid header name '{}': {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TranslateError::Config(format!("Invalid value for header '{}': {}", name, e)))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            max_retries: options.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
        })
    }

    /// Execute the request built by `build`, retrying transient failures.
    ///
    /// The first attempt is expected to have been paced by the caller; every
    /// retry reserves its own slot on `pacer` after the backoff. The builder
    /// is invoked once per attempt. Client errors (4xx other than 429) are
    /// returned immediately.
    pub async fn execute<F>(&self, pacer: &RequestPacer, build: F) -> Result<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                debug!("Retry attempt {} after {}ms delay", attempt, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                pacer.wait_turn().await;
            }

            match self.call(build(&self.client)).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| TranslateError::Transport("Unknown error".to_string())))
    }

    async fn call(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        debug!("Response status: {}", status);

        let body = response.text().await?;
        if !status.is_success() {
            return Err(TranslateError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }
}

/// Base URL from the options, or the adapter default, without a trailing slash.
pub fn endpoint_or(options: &AdapterOptions, default: &str) -> String {
    options
        .api_endpoint
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
