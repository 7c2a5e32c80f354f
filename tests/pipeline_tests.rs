//! Integration tests for the fetch pipeline
//!
//! These tests run `fetch_with_retry` against wiremock servers to check the
//! retry policy and the error taxonomy end-to-end.

use quikturn_logos::config::UserAgentConfig;
use quikturn_logos::fetch::{build_http_client, fetch_with_retry, Auth, FetchOptions, Warning};
use quikturn_logos::{ErrorCode, LogoError, Tier};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn logo_url(server: &MockServer, domain: &str) -> Url {
    Url::parse(&format!("{}/{}", server.uri(), domain)).unwrap()
}

async fn fetch(
    server: &MockServer,
    domain: &str,
    options: &FetchOptions,
) -> Result<reqwest::Response, LogoError> {
    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    fetch_with_retry(&client, &logo_url(server, domain), &Auth::None, options).await
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn test_success_returns_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/github.com"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .expect(1)
        .mount(&server)
        .await;

    let response = fetch(&server, "github.com", &FetchOptions::default()).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.bytes().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_rate_limit_retries_then_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "1")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "1700000060"),
        )
        .mount(&server)
        .await;

    let start = Instant::now();
    let err = fetch(&server, "github.com", &FetchOptions::default()).await.unwrap_err();

    assert_eq!(request_count(&server).await, 3);
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(
        err,
        LogoError::RateLimit {
            retry_after: 1,
            remaining: 0,
            reset: 1_700_000_060,
        }
    );
}

#[tokio::test]
async fn test_rate_limit_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("logo"))
        .mount(&server)
        .await;

    let response = fetch(&server, "github.com", &FetchOptions::default()).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_zero_retries_fails_on_first_429() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "30"))
        .mount(&server)
        .await;

    let options = FetchOptions {
        max_retries: 0,
        ..FetchOptions::default()
    };
    let err = fetch(&server, "github.com", &options).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::RateLimit);
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_quota_exceeded_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "86400")
                .insert_header("x-quota-limit", "500000")
                .insert_header("x-quota-remaining", "0"),
        )
        .mount(&server)
        .await;

    let err = fetch(&server, "github.com", &FetchOptions::default()).await.unwrap_err();
    assert_eq!(
        err,
        LogoError::QuotaExceeded {
            retry_after: 86_400,
            limit: 500_000,
            used: 500_000,
        }
    );
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_server_error_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = fetch(&server, "github.com", &FetchOptions::default()).await.unwrap_err();
    assert_eq!(
        err,
        LogoError::Server {
            status: 500,
            message: "boom".to_string(),
        }
    );
    assert_eq!(request_count(&server).await, 2);
}

#[tokio::test]
async fn test_server_error_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    assert!(fetch(&server, "github.com", &FetchOptions::default()).await.is_ok());
}

#[tokio::test]
async fn test_fail_fast_statuses() {
    let cases: Vec<(u16, &str, ErrorCode)> = vec![
        (401, "bad token", ErrorCode::Authentication),
        (403, "tier too low", ErrorCode::Forbidden),
        (404, "", ErrorCode::NotFound),
        (400, "size must be a number", ErrorCode::BadRequest),
        (502, "gateway", ErrorCode::Unexpected),
        (503, "", ErrorCode::Unexpected),
    ];

    for (status, body, code) in cases {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;

        let err = fetch(&server, "github.com", &FetchOptions::default()).await.unwrap_err();
        assert_eq!(err.code(), code, "status {}", status);
        assert_eq!(err.status(), Some(status));
        assert_eq!(request_count(&server).await, 1, "status {} must not retry", status);
    }
}

#[tokio::test]
async fn test_error_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.com"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private.com"))
        .respond_with(ResponseTemplate::new(403).set_body_string("tier too low"))
        .mount(&server)
        .await;

    let options = FetchOptions::default();
    assert_eq!(
        fetch(&server, "missing.com", &options).await.unwrap_err(),
        LogoError::NotFound {
            domain: "missing.com".to_string()
        }
    );
    assert_eq!(
        fetch(&server, "private.com", &options).await.unwrap_err(),
        LogoError::Forbidden {
            reason: "tier too low".to_string()
        }
    );
}

#[tokio::test]
async fn test_long_error_body_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(5000)))
        .mount(&server)
        .await;

    match fetch(&server, "github.com", &FetchOptions::default()).await.unwrap_err() {
        LogoError::BadRequest { message } => assert_eq!(message.len(), 256),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_bearer_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    let auth = Auth::Bearer("sk_test_123".to_string());
    let url = logo_url(&server, "github.com");
    let response = fetch_with_retry(&client, &url, &auth, &FetchOptions::default())
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_query_auth_appended_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("token", "qt_abc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    let auth = Auth::Query("qt_abc".to_string());
    let mut url = logo_url(&server, "github.com");
    url.query_pairs_mut().append_pair("token", "qt_abc");

    fetch_with_retry(&client, &url, &auth, &FetchOptions::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert_eq!(query.matches("token=").count(), 1);
}

#[tokio::test]
async fn test_user_agent_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("user-agent", "logo-sync/2.0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_http_client(&UserAgentConfig {
        name: "logo-sync".to_string(),
        version: "2.0".to_string(),
    })
    .unwrap();
    let url = logo_url(&server, "github.com");
    fetch_with_retry(&client, &url, &Auth::None, &FetchOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_warnings_emitted_below_ten_percent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "5")
                .insert_header("x-ratelimit-limit", "100")
                .insert_header("x-quota-remaining", "40000"),
        )
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = FetchOptions {
        tier: Tier::Free,
        on_warning: Some(Arc::new(move |w: &Warning| sink.lock().unwrap().push(*w))),
        ..FetchOptions::default()
    };

    fetch(&server, "github.com", &options).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            Warning::RateLimit {
                remaining: 5,
                limit: 100
            },
            Warning::Quota {
                remaining: 40_000,
                limit: 500_000
            },
        ]
    );
}

#[tokio::test]
async fn test_no_warning_at_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-ratelimit-remaining", "10")
                .insert_header("x-ratelimit-limit", "100"),
        )
        .mount(&server)
        .await;

    let count = Arc::new(Mutex::new(0));
    let sink = count.clone();
    let options = FetchOptions {
        on_warning: Some(Arc::new(move |_: &Warning| *sink.lock().unwrap() += 1)),
        ..FetchOptions::default()
    };

    fetch(&server, "github.com", &options).await.unwrap();
    assert_eq!(*count.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_cancel_during_backoff_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "60"))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let options = FetchOptions {
        cancel: Some(cancel.clone()),
        ..FetchOptions::default()
    };

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let err = fetch(&server, "github.com", &options).await.unwrap_err();
    assert_eq!(err, LogoError::Abort);
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_cancelled_before_start_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let options = FetchOptions {
        cancel: Some(cancel),
        ..FetchOptions::default()
    };

    assert_eq!(fetch(&server, "github.com", &options).await.unwrap_err(), LogoError::Abort);
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Bind and release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let url = Url::parse(&format!("http://127.0.0.1:{}/github.com", port)).unwrap();

    let client = build_http_client(&UserAgentConfig::default()).unwrap();
    let err = fetch_with_retry(&client, &url, &Auth::None, &FetchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Network);
}
