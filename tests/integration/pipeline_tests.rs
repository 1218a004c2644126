//! Integration tests for the retrieval pipeline
//!
//! These tests use wiremock to stand in for the Wikipedia REST API and drive
//! the fetcher, the retrier and whole runs against it.

use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiki_ipsum::config::{finalize, load_config, BackoffConfig, Config};
use wiki_ipsum::output::StopReason;
use wiki_ipsum::pipeline::{
    BackoffRetrier, Coordinator, FetchError, FetchOutcome, FetchResult, SummaryFetcher,
    SummarySource,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUMMARY_PATH: &str = "/en/summary";

/// Creates a configuration pointing at the mock server
fn create_test_config(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.lang = "en".to_string();
    config.api.user_agent = "test@example.com".to_string();
    config.api.url_template = format!("{}/{{lang}}/summary", server.uri());
    config.api.request_timeout = 2_000;
    config
}

/// Backoff short enough for tests against a real clock
fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        initial_interval: 10,
        multiplier: 2.0,
        randomization_factor: 0.0,
        max_interval: 100,
        max_elapsed_time: 1_000,
    }
}

fn summary_response(extract: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "title": "Test page",
        "extract": extract,
    }))
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_fetch_sends_headers_and_trims_extract() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .and(header("user-agent", "test@example.com"))
        .and(header("accept", "application/problem+json"))
        .respond_with(summary_response("  Hello world.  "))
        .mount(&server)
        .await;

    let fetcher = SummaryFetcher::from_config(&create_test_config(&server).api).unwrap();
    let outcome = fetcher.fetch(&CancellationToken::new()).await;

    assert_eq!(outcome, FetchOutcome::Success(FetchResult::new("Hello world.")));
}

#[tokio::test]
async fn test_throttled_attempt_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(summary_response("After the storm."))
        .mount(&server)
        .await;

    let fetcher = SummaryFetcher::from_config(&create_test_config(&server).api).unwrap();
    let retrier = BackoffRetrier::new(fast_backoff());
    let (pacing_tx, mut pacing_rx) = mpsc::unbounded_channel();

    let outcome = retrier
        .run(&fetcher, &CancellationToken::new(), &pacing_tx)
        .await;

    assert_eq!(outcome.into_result().unwrap().text(), "After the storm.");
    assert_eq!(request_count(&server).await, 2);
    assert_eq!(pacing_rx.try_recv().unwrap(), Duration::from_millis(10));
    assert!(pacing_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_server_error_is_fatal_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let fetcher = SummaryFetcher::from_config(&create_test_config(&server).api).unwrap();
    let retrier = BackoffRetrier::new(fast_backoff());
    let (pacing_tx, mut pacing_rx) = mpsc::unbounded_channel();

    let outcome = retrier
        .run(&fetcher, &CancellationToken::new(), &pacing_tx)
        .await;

    assert_eq!(
        outcome,
        FetchOutcome::Fatal(FetchError::BadStatus { status: 503 })
    );
    assert_eq!(request_count(&server).await, 1);
    assert!(pacing_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_unexpected_content_type_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Maintenance</body></html>")
                .insert_header("content-type", "text/html"),
        )
        .mount(&server)
        .await;

    let fetcher = SummaryFetcher::from_config(&create_test_config(&server).api).unwrap();
    let outcome = fetcher.fetch(&CancellationToken::new()).await;

    assert!(matches!(
        outcome,
        FetchOutcome::Fatal(FetchError::BadContentType { .. })
    ));
}

#[tokio::test]
async fn test_missing_extract_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "title": "No text" })))
        .mount(&server)
        .await;

    let fetcher = SummaryFetcher::from_config(&create_test_config(&server).api).unwrap();
    let outcome = fetcher.fetch(&CancellationToken::new()).await;

    assert!(matches!(outcome, FetchOutcome::Fatal(FetchError::Decode(_))));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(summary_response("Too late.").set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.api.request_timeout = 200;
    let fetcher = SummaryFetcher::from_config(&config.api).unwrap();

    let outcome = fetcher.fetch(&CancellationToken::new()).await;

    assert_eq!(outcome, FetchOutcome::Cancelled(FetchError::Timeout));
}

#[tokio::test]
async fn test_cancel_aborts_request_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(summary_response("Never seen.").set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.api.request_timeout = 30_000;
    let fetcher = SummaryFetcher::from_config(&config.api).unwrap();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), fetcher.fetch(&cancel))
        .await
        .expect("cancellation should abort the request");

    assert_eq!(outcome, FetchOutcome::Cancelled(FetchError::Cancelled));
}

#[tokio::test]
async fn test_full_run_reaches_target_length() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(summary_response("Lorem ipsum dolor sit amet."))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.pipeline.target_length = 100;
    config.pipeline.rate = 50.0;
    let config = finalize(config).unwrap();

    let coordinator = Coordinator::from_config(&config).unwrap();
    let mut output = Vec::new();

    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator.run(&mut output))
        .await
        .expect("run should finish once the target is reached")
        .unwrap();

    // 27 characters plus separator per line: four lines cross 100 bytes
    assert_eq!(summary.stop_reason, Some(StopReason::TargetReached));
    assert_eq!(summary.bytes_written, 112);
    assert_eq!(summary.snippets_written, 4);
    assert!(summary.dispatched >= 4);

    let text = String::from_utf8(output).unwrap();
    assert_eq!(text.lines().count(), 4);
    assert!(text.lines().all(|line| line == "Lorem ipsum dolor sit amet."));
}

#[tokio::test]
async fn test_full_run_survives_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(summary_response("Recovered."))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.pipeline.target_length = 1;
    config.pipeline.rate = 20.0;
    config.pipeline.max_in_flight = 1;

    let coordinator = Coordinator::from_config(&finalize(config).unwrap()).unwrap();
    let mut output = Vec::new();

    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator.run(&mut output))
        .await
        .expect("run should finish once the target is reached")
        .unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::TargetReached));
    assert_eq!(String::from_utf8(output).unwrap(), "Recovered.\n");
    assert!(summary.error_count() <= 3);
}

#[tokio::test]
async fn test_stop_handle_ends_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(summary_response("Again and again."))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.pipeline.rate = 10.0;
    let coordinator = Coordinator::from_config(&finalize(config).unwrap()).unwrap();

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.stop();
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), coordinator.run(tokio::io::sink()))
        .await
        .expect("stop should end an unbounded run")
        .unwrap();

    assert_eq!(summary.stop_reason, Some(StopReason::Interrupted));
    assert!(summary.dispatched <= 7, "dispatched {}", summary.dispatched);
}

#[test]
fn test_config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[api]
lang = "de"
user-agent = "ops@example.com"
request-timeout = 3000

[pipeline]
rate = 500.0
target-length = 2048
max-in-flight = 16

[backoff]
initial-interval = 250
"#
    )
    .unwrap();

    let config = finalize(load_config(file.path()).unwrap()).unwrap();

    assert_eq!(
        config.api.endpoint(),
        "https://de.wikipedia.org/api/rest_v1/page/random/summary"
    );
    assert_eq!(config.api.request_timeout(), Duration::from_secs(3));
    assert_eq!(config.pipeline.rate, 200.0);
    assert_eq!(config.pipeline.target_length, 2048);
    assert_eq!(config.pipeline.max_in_flight, 16);
    assert_eq!(config.backoff.initial_interval(), Duration::from_millis(250));
    assert_eq!(config.backoff.multiplier, 1.5);
}

#[tokio::test]
async fn test_coordinator_accepts_trait_object_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SUMMARY_PATH))
        .respond_with(summary_response("Dynamic."))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server);
    config.pipeline.target_length = 9;
    let config = finalize(config).unwrap();

    let source: Arc<dyn SummarySource> = Arc::new(SummaryFetcher::from_config(&config.api).unwrap());
    let mut output = Vec::new();

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        Coordinator::new(&config, source).run(&mut output),
    )
    .await
    .expect("run should finish")
    .unwrap();

    assert_eq!(summary.bytes_written, 9);
    assert_eq!(output, b"Dynamic.\n".to_vec());
}
