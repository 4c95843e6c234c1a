//! Mock API tests for the HTTP backends
//!
//! Each adapter is pointed at a local `wiremock` server through its
//! `api_endpoint` option, so no real service is contacted.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};
use translators::batch::BatchPolicy;
use translators::translate::{DeepLTranslator, GoogleTranslator, LibreTranslator};
use translators::{AdapterOptions, Language, SourceLanguage, TranslateError, Translator};
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn lang(code: &str) -> Language {
    Language::new(code).unwrap()
}

fn options_for(server: &MockServer) -> AdapterOptions {
    AdapterOptions::default()
        .with_endpoint(server.uri())
        .with_header("X-Test", "mock")
}

// ============================================================================
// Google Translate
// ============================================================================

mod google_tests {
    use super::*;

    #[tokio::test]
    async fn test_google_batch_translation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_a/t"))
            .and(query_param("client", "gtx"))
            .and(query_param("sl", "en"))
            .and(query_param("tl", "ru"))
            .and(query_param("format", "html"))
            .and(body_string_contains("q="))
            .and(header("X-Test", "mock"))
            .and(header_exists("User-Agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                "<pre><a i=0>привет мир</a> <a i=1>меня зовут Джефф</a></pre>"
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let translator = GoogleTranslator::new(options_for(&server)).unwrap();
        let results = translator
            .translate_batch(&["Hello world", "my name is Jeff"], lang("en").into(), lang("ru"))
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                Some("привет мир".to_string()),
                Some("меня зовут Джефф".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_google_auto_detect_response_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate_a/t"))
            .and(query_param("sl", "auto"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([["<pre><a i=0>Hallo</a></pre>", "en"]])),
            )
            .mount(&server)
            .await;

        let translator = GoogleTranslator::new(options_for(&server)).unwrap();
        let text = translator
            .translate("Hello", SourceLanguage::Auto, lang("de"))
            .await
            .unwrap();
        assert_eq!(text, "Hallo");
    }

    #[tokio::test]
    async fn test_google_user_agent_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("User-Agent", "custom-agent/2.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["<a i=0>ok</a>"])))
            .expect(1)
            .mount(&server)
            .await;

        let options = options_for(&server).with_header("User-Agent", "custom-agent/2.0");
        let translator = GoogleTranslator::new(options).unwrap();
        assert_ok!(translator.translate("ok", SourceLanguage::Auto, lang("en")).await);
    }

    #[tokio::test]
    async fn test_google_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["<a i=0>Bonjour</a>"])))
            .expect(1)
            .mount(&server)
            .await;

        let mut options = options_for(&server);
        options.max_retries = Some(1);
        let translator = GoogleTranslator::new(options).unwrap();

        let text = translator
            .translate("Hello", SourceLanguage::Auto, lang("fr"))
            .await
            .unwrap();
        assert_eq!(text, "Bonjour");
    }

    /// Fails the first request with 503 and records when each request arrived.
    struct FlakyClock {
        arrivals: Arc<Mutex<Vec<Instant>>>,
        calls: AtomicUsize,
    }

    impl Respond for FlakyClock {
        fn respond(&self, _request: &Request) -> ResponseTemplate {
            self.arrivals.lock().unwrap().push(Instant::now());
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(json!(["<pre><a i=0>ok</a></pre>"]))
            }
        }
    }

    #[tokio::test]
    async fn test_google_retry_keeps_request_spacing() {
        let server = MockServer::start().await;
        let arrivals = Arc::new(Mutex::new(Vec::new()));
        Mock::given(method("POST"))
            .respond_with(FlakyClock {
                arrivals: arrivals.clone(),
                calls: AtomicUsize::new(0),
            })
            .expect(3)
            .mount(&server)
            .await;

        let mut options = options_for(&server);
        options.max_retries = Some(1);
        let translator = GoogleTranslator::new(options).unwrap();
        let spacing = translator.requests_timeout();

        // each text needs its own round
        let first = "a".repeat(3000);
        let second = "b".repeat(3000);
        let results = translator
            .translate_batch(&[first.as_str(), second.as_str()], SourceLanguage::Auto, lang("fr"))
            .await
            .unwrap();
        assert_eq!(results, vec![Some("ok".to_string()), Some("ok".to_string())]);

        let mut arrivals = arrivals.lock().unwrap().clone();
        arrivals.sort();
        assert_eq!(arrivals.len(), 3);
        for pair in arrivals.windows(2) {
            // small allowance for delivery jitter
            assert!(pair[1] - pair[0] >= spacing - Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_google_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let translator = GoogleTranslator::new(options_for(&server)).unwrap();
        let err = translator
            .translate_batch(&["Hello"], SourceLanguage::Auto, lang("fr"))
            .await
            .unwrap_err();

        assert!(matches!(err, TranslateError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_google_oversized_text_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let translator = GoogleTranslator::new(options_for(&server)).unwrap();
        let long = "word ".repeat(2000);
        let result = translator
            .translate_batch(&[long.as_str()], SourceLanguage::Auto, lang("fr"))
            .await;

        assert!(matches!(result, Err(TranslateError::LimitExceeded { index: 0, .. })));
    }
}

// ============================================================================
// DeepL
// ============================================================================

mod deepl_tests {
    use super::*;

    #[tokio::test]
    async fn test_deepl_sends_key_and_languages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/translate"))
            .and(header("Authorization", "DeepL-Auth-Key test-key"))
            .and(body_string_contains("target_lang=DE"))
            .and(body_string_contains("source_lang=EN"))
            .and(body_string_contains("tag_handling=html"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translations": [{
                    "detected_source_language": "EN",
                    "text": "<pre><a i=0>Guten Morgen</a><a i=1>Gute Nacht</a></pre>"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = options_for(&server).with_api_key("test-key");
        let translator = DeepLTranslator::new(options).unwrap();
        let results = translator
            .translate_batch(&["Good morning", "Good night"], lang("en").into(), lang("de"))
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![Some("Guten Morgen".to_string()), Some("Gute Nacht".to_string())]
        );
    }

    #[tokio::test]
    async fn test_deepl_same_language_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let translator = DeepLTranslator::new(options_for(&server).with_api_key("k")).unwrap();
        let result = translator
            .translate_batch(&["Hallo"], lang("de").into(), lang("de"))
            .await;

        assert!(matches!(result, Err(TranslateError::UnsupportedDirection { .. })));
    }

    #[tokio::test]
    async fn test_deepl_quota_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(456).set_body_string("Quota exceeded"))
            .mount(&server)
            .await;

        let translator = DeepLTranslator::new(options_for(&server).with_api_key("k")).unwrap();
        let result = translator
            .translate("Hello", SourceLanguage::Auto, lang("de"))
            .await;

        assert_err!(&result);
        assert!(result.unwrap_err().to_string().contains("Quota exceeded"));
    }
}

// ============================================================================
// LibreTranslate
// ============================================================================

mod libre_tests {
    use super::*;

    /// Upper-cases the content of the JSON `q` field, keeping markers intact.
    struct ShoutingLibre;

    impl Respond for ShoutingLibre {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: Value = match serde_json::from_slice(&request.body) {
                Ok(body) => body,
                Err(_) => return ResponseTemplate::new(400),
            };
            let q = body["q"].as_str().unwrap_or_default();
            let shouted = q
                .to_uppercase()
                .replace("<PRE>", "<pre>")
                .replace("</PRE>", "</pre>")
                .replace("<A I=", "<a i=")
                .replace("</A>", "</a>")
                .replace("&AMP;", "&amp;");
            ResponseTemplate::new(200).set_body_json(json!({ "translatedText": shouted }))
        }
    }

    #[tokio::test]
    async fn test_libre_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(header("content-type", "application/json"))
            .respond_with(ShoutingLibre)
            .expect(1)
            .mount(&server)
            .await;

        let translator = LibreTranslator::new(options_for(&server)).unwrap();
        let results = translator
            .translate_batch(&["hello", "", "tom & jerry"], SourceLanguage::Auto, lang("en"))
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                Some("HELLO".to_string()),
                Some(String::new()),
                Some("TOM & JERRY".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_libre_sends_api_key_and_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/translate"))
            .and(body_string_contains("\"api_key\":\"libre-key\""))
            .and(body_string_contains("\"format\":\"html\""))
            .and(body_string_contains("\"source\":\"auto\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "translatedText": "<pre><a i=0>hola</a></pre>"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = options_for(&server).with_api_key("libre-key");
        let translator = LibreTranslator::new(options).unwrap();
        let text = translator
            .translate("hello", SourceLanguage::Auto, lang("es"))
            .await
            .unwrap();
        assert_eq!(text, "hola");
    }

    #[tokio::test]
    async fn test_libre_error_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "error": "Invalid API key"
            })))
            .mount(&server)
            .await;

        let translator = LibreTranslator::new(options_for(&server)).unwrap();
        let err = translator
            .translate("hello", SourceLanguage::Auto, lang("es"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_libre_with_custom_policy() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ShoutingLibre)
            .mount(&server)
            .await;

        let translator = LibreTranslator::new(options_for(&server))
            .unwrap()
            .with_policy(BatchPolicy::default().with_concurrency(1));
        assert_eq!(translator.policy().concurrency, 1);

        let results = translator
            .translate_batch(&["a", "b"], SourceLanguage::Auto, lang("en"))
            .await
            .unwrap();
        assert_eq!(results, vec![Some("A".to_string()), Some("B".to_string())]);
    }
}
