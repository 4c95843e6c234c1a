use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Text at index {index} exceeds the backend length limit by {excess} characters")]
    LimitExceeded { index: usize, excess: usize },

    #[error("Could not recover translation from backend response: {0}")]
    DecodeMismatch(String),

    #[error("Translation direction {from} -> {to} is not supported by {backend}")]
    UnsupportedDirection {
        backend: &'static str,
        from: String,
        to: String,
    },

    #[error("Language '{code}' is not supported by {backend}")]
    UnsupportedLanguage { backend: &'static str, code: String },

    #[error("{0} does not support automatic source language detection")]
    AutoNotSupported(&'static str),

    #[error("Unknown language code: {0}")]
    UnknownLanguage(String),

    #[error("Translation failed after {completed} of {total} texts: {source}")]
    Partial {
        results: Vec<Option<String>>,
        completed: usize,
        total: usize,
        #[source]
        source: Box<TranslateError>,
    },

    #[error("Translation timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Translation was cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl TranslateError {
    /// Whether a retry of the same request could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Api { status, .. } => *status == 429 || *status >= 500,
            TranslateError::Transport(_) => true,
            TranslateError::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Results salvaged from rounds that completed before the failure.
    pub fn partial_results(&self) -> Option<&[Option<String>]> {
        match self {
            TranslateError::Partial { results, .. } => Some(results),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let rate_limited = TranslateError::Api {
            status: 429,
            message: "slow down".to_string(),
        };
        let bad_request = TranslateError::Api {
            status: 400,
            message: "bad".to_string(),
        };
        assert!(rate_limited.is_retryable());
        assert!(!bad_request.is_retryable());
        assert!(!TranslateError::DecodeMismatch("x".to_string()).is_retryable());
    }

    #[test]
    fn test_partial_results_exposed() {
        let err = TranslateError::Partial {
            results: vec![Some("a".to_string()), None],
            completed: 1,
            total: 2,
            source: Box::new(TranslateError::Transport("reset".to_string())),
        };
        assert_eq!(err.partial_results().map(|r| r.len()), Some(2));
        assert!(err.to_string().contains("1 of 2"));
    }
}
