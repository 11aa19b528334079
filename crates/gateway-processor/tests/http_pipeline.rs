//! End-to-end tests of the processor over the `reqwest` transport against a
//! local mock server.

use gateway_config::{ConfigLoader, ConfigSource};
use gateway_core::{HealthStatus, RequestOptions};
use gateway_processor::{ApiProcessor, ProcessorConfig};
use mockito::{Matcher, Server};
use serde_json::json;
use std::time::Duration;

fn fast_retry_config() -> ProcessorConfig {
    let mut config = ProcessorConfig::default();
    config.retry.max_backoff = Duration::from_millis(10);
    config
}

#[tokio::test]
async fn get_is_sent_with_query_and_headers_then_cached() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("function".into(), "GLOBAL_QUOTE".into()),
            Matcher::UrlEncoded("symbol".into(), "IBM".into()),
        ]))
        .match_header("x-api-key", "demo")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"price": "135.20"}"#)
        .expect(1)
        .create_async()
        .await;

    let processor = ApiProcessor::new(ProcessorConfig::default()).expect("processor");
    let url = format!("{}/query", server.url());
    let options = RequestOptions::new()
        .param("function", "GLOBAL_QUOTE")
        .param("symbol", "IBM")
        .header("x-api-key", "demo");

    let first = processor.get(&url, "alphavantage", options.clone()).await;
    let second = processor.get(&url, "alphavantage", options).await;

    assert!(first.success);
    assert_eq!(first.status_code, Some(200));
    assert_eq!(first.attempts, 1);
    assert_eq!(first.data, Some(json!({"price": "135.20"})));
    assert!(second.cached);
    mock.assert_async().await;
}

#[tokio::test]
async fn post_sends_json_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_body(Matcher::Json(json!({"prompt": "hello"})))
        .with_status(201)
        .with_body(r#"{"id": "msg_1"}"#)
        .expect(2)
        .create_async()
        .await;

    let processor = ApiProcessor::new(ProcessorConfig::default()).expect("processor");
    let url = format!("{}/v1/messages", server.url());

    for _ in 0..2 {
        let response = processor
            .post(&url, "llm", RequestOptions::new().with_body(json!({"prompt": "hello"})))
            .await;
        assert!(response.success);
        assert_eq!(response.status_code, Some(201));
        assert!(!response.cached);
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn retryable_status_exhausts_attempts() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/unstable")
        .with_status(503)
        .with_body("maintenance")
        .expect(3)
        .create_async()
        .await;

    let processor = ApiProcessor::new(fast_retry_config()).expect("processor");
    let response = processor
        .get(&format!("{}/unstable", server.url()), "x", RequestOptions::new())
        .await;

    assert!(!response.success);
    assert_eq!(response.attempts, 3);
    assert_eq!(response.status_code, Some(503));
    assert!(response.error.as_deref().unwrap_or("").contains("maintenance"));
    mock.assert_async().await;
}

#[tokio::test]
async fn client_error_fails_after_one_attempt() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/missing")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let processor = ApiProcessor::new(fast_retry_config()).expect("processor");
    let response = processor
        .get(&format!("{}/missing", server.url()), "x", RequestOptions::new())
        .await;

    assert!(!response.success);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.status_code, Some(404));
    assert_eq!(processor.stats().errors_by_provider["x"], 1);
    mock.assert_async().await;
}

#[tokio::test]
async fn connection_refused_is_a_transport_failure() {
    let mut config = fast_retry_config();
    config.retry.max_attempts = 2;
    let processor = ApiProcessor::new(config).expect("processor");

    let response = processor
        .get("http://127.0.0.1:1/unreachable", "offline", RequestOptions::new())
        .await;

    assert!(!response.success);
    assert_eq!(response.attempts, 2);
    assert_eq!(response.status_code, None);
    assert!(response.error.as_deref().unwrap_or("").starts_with("Transport error"));

    let health = processor.provider_health("offline");
    assert_eq!(health.total_failures, 1);
    assert_eq!(health.status, HealthStatus::Unknown);
}

#[tokio::test]
async fn processor_built_from_loaded_config() {
    let yaml = r#"
rate_limit:
  default_limit: 100
  default_window: 1s
retry:
  max_retries: 1
providers:
  - name: etherscan
    rate_limit: 5
    window: 1s
"#;
    let config = ConfigLoader::new()
        .with_source(ConfigSource::Yaml(yaml.to_string()))
        .load()
        .await
        .expect("config");

    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api")
        .with_status(200)
        .with_body("1.0")
        .create_async()
        .await;

    let processor = ApiProcessor::from_config(&config).expect("processor");
    let response = processor
        .get(&format!("{}/api", server.url()), "etherscan", RequestOptions::new())
        .await;

    assert!(response.success);
    assert_eq!(response.data, Some(json!(1.0)));

    let stats = processor.stats();
    assert_eq!(stats.rate_limiters["etherscan"].rate, 5);
    assert_eq!(stats.requests_by_provider["etherscan"], 1);
    mock.assert_async().await;
}
