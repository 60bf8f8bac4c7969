//! Integration tests for the download module.
//!
//! These tests drive the retrying downloader against mock HTTP servers.

use std::sync::Mutex;
use std::time::Duration;

use imgcache_core::download::{DownloadError, Downloader, HttpClient, RetryPolicy};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1))
}

fn url(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{p}", server.uri())).expect("mock URL")
}

#[tokio::test]
async fn test_fetch_returns_body_and_reports_capped_progress() {
    let mock_server = MockServer::start().await;
    let body: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/big.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let progress = Mutex::new(Vec::new());
    let on_progress = |p: u8| progress.lock().expect("progress lock").push(p);
    let payload = Downloader::default()
        .fetch(
            &url(&mock_server, "/big.png"),
            Duration::from_secs(5),
            &fast_policy(3),
            &on_progress,
            &CancellationToken::new(),
        )
        .await
        .expect("fetch should succeed");

    assert_eq!(payload.bytes.as_ref(), body.as_slice());
    assert_eq!(payload.attempts, 1);

    let progress = progress.into_inner().expect("progress lock");
    assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{progress:?}");
    assert!(progress.iter().all(|p| *p <= 99), "{progress:?}");
}

#[tokio::test]
async fn test_fetch_retries_gateway_timeouts_then_succeeds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.png"))
        .respond_with(ResponseTemplate::new(504))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"image".to_vec()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let payload = Downloader::default()
        .fetch(
            &url(&mock_server, "/flaky.png"),
            Duration::from_secs(5),
            &fast_policy(3),
            &|_: u8| {},
            &CancellationToken::new(),
        )
        .await
        .expect("third attempt should succeed");

    assert_eq!(payload.attempts, 3);
    assert_eq!(payload.bytes.as_ref(), b"image");
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down.png"))
        .respond_with(ResponseTemplate::new(504))
        .expect(3)
        .mount(&mock_server)
        .await;

    let err = Downloader::default()
        .fetch(
            &url(&mock_server, "/down.png"),
            Duration::from_secs(5),
            &fast_policy(3),
            &|_: u8| {},
            &CancellationToken::new(),
        )
        .await
        .expect_err("all attempts fail");

    match err {
        DownloadError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, DownloadError::HttpStatus { status: 504, .. }));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fetch_does_not_retry_other_statuses() {
    for status in [404u16, 500, 503] {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = Downloader::default()
            .fetch(
                &url(&mock_server, "/x.png"),
                Duration::from_secs(5),
                &fast_policy(3),
                &|_: u8| {},
                &CancellationToken::new(),
            )
            .await
            .expect_err("status is fatal");

        assert!(
            matches!(err, DownloadError::HttpStatus { status: s, .. } if s == status),
            "Expected HttpStatus {status}, got: {err:?}"
        );
    }
}

#[tokio::test]
async fn test_attempt_timeout_is_fatal_without_retry() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = Downloader::default()
        .fetch(
            &url(&mock_server, "/slow.png"),
            Duration::from_millis(100),
            &fast_policy(3),
            &|_: u8| {},
            &CancellationToken::new(),
        )
        .await
        .expect_err("attempt times out");

    assert!(
        matches!(err, DownloadError::Timeout { .. }),
        "Expected Timeout after a single attempt, got: {err:?}"
    );
    let received = mock_server.received_requests().await.expect("recording on");
    assert_eq!(received.len(), 1);
}

#[tokio::test]
async fn test_fetch_stops_when_cancelled() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = Downloader::default()
        .fetch(
            &url(&mock_server, "/slow.png"),
            Duration::from_secs(10),
            &fast_policy(3),
            &|_: u8| {},
            &cancel,
        )
        .await
        .expect_err("cancelled");

    assert!(matches!(err, DownloadError::Cancelled { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_connection_refused_is_fatal_network_error() {
    // Bind then drop a listener so the port is very likely closed.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let err = Downloader::new(HttpClient::new())
        .fetch(
            &Url::parse(&format!("http://127.0.0.1:{port}/x.png")).expect("url"),
            Duration::from_secs(5),
            &fast_policy(3),
            &|_: u8| {},
            &CancellationToken::new(),
        )
        .await
        .expect_err("nothing listens");

    assert!(
        matches!(err, DownloadError::Network { .. }),
        "Expected Network, got: {err:?}"
    );
}
