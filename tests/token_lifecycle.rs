//! Integration tests for the token manager against a mock identity provider
//!
//! Verifies both form shapes, caching, proactive expiry, the failure modes of
//! the exchange, and that demo mode never touches the network.

use research_relay::auth::{AuthError, Credentials, DEMO_TOKEN, TokenManager};
use research_relay::metrics::{Metrics, TokenFetchOutcome};
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/identity/token";
const ENCODED_GRANT_TYPE: &str = "grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey";

fn manager(api_key: &str, iam: &MockServer) -> (TokenManager, Arc<Metrics>) {
    manager_with_timeout(api_key, iam, 5)
}

fn manager_with_timeout(
    api_key: &str,
    iam: &MockServer,
    timeout_seconds: u64,
) -> (TokenManager, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new().expect("should create Metrics"));
    let credentials = Credentials::new(
        Secret::new(api_key.to_string()),
        format!("{}{}", iam.uri(), TOKEN_PATH),
    );
    let manager =
        TokenManager::new(credentials, timeout_seconds, metrics.clone())
            .expect("should create TokenManager");
    (manager, metrics)
}

fn token_body(token: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": 3600,
    })
}

#[tokio::test]
async fn test_standard_key_form_body() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(header("accept", "application/json"))
        .and(body_string_contains(ENCODED_GRANT_TYPE))
        .and(body_string_contains("apikey=standard-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("standard-token")))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, metrics) = manager("standard-key", &iam);
    let token = manager.get_token().await.expect("token exchange should succeed");

    assert_eq!(token.as_str(), "standard-token");
    assert_eq!(metrics.token_fetch_count(TokenFetchOutcome::Success), 1);

    let requests = iam.received_requests().await.unwrap();
    let body = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(
        !body.contains("response_type"),
        "standard keys must not request cloud_iam: {}",
        body
    );
}

#[tokio::test]
async fn test_cloud_pak_key_adds_response_type() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains(ENCODED_GRANT_TYPE))
        .and(body_string_contains("apikey=cpd-apikey-abc123"))
        .and(body_string_contains("response_type=cloud_iam"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("cpd-token")))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, _) = manager("cpd-apikey-abc123", &iam);
    let token = manager.get_token().await.expect("token exchange should succeed");
    assert_eq!(token.as_str(), "cpd-token");
}

#[tokio::test]
async fn test_token_is_cached_between_calls() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("cached-token")))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    let first = manager.token().await.unwrap();
    let second = manager.token().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_get_token_always_exchanges() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("t")))
        .expect(2)
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    manager.get_token().await.unwrap();
    manager.get_token().await.unwrap();
}

#[tokio::test]
async fn test_token_near_expiry_is_replaced() {
    let iam = MockServer::start().await;
    // Expires inside the safety margin, so it is never reused
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "short-lived",
            "expires_in": 30,
        })))
        .expect(2)
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    manager.token().await.unwrap();
    manager.token().await.unwrap();
}

#[tokio::test]
async fn test_token_without_expires_in_is_kept() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "no-expiry"})),
        )
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    for _ in 0..3 {
        assert_eq!(manager.token().await.unwrap().as_str(), "no-expiry");
    }
}

#[tokio::test]
async fn test_huge_expires_in_is_treated_as_no_expiry() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"access_token": "long-lived", "expires_in": 18446744073709551615}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, metrics) = manager("key", &iam);
    for _ in 0..3 {
        assert_eq!(manager.token().await.unwrap().as_str(), "long-lived");
    }
    assert_eq!(metrics.token_fetch_count(TokenFetchOutcome::Success), 1);
}

#[tokio::test]
async fn test_fractional_or_negative_expires_in_still_yields_token() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"access_token": "fractional", "expires_in": 3599.5}"#,
            "application/json",
        ))
        .up_to_n_times(1)
        .expect(1)
        .mount(&iam)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"access_token": "negative", "expires_in": -1}"#,
            "application/json",
        ))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    assert_eq!(manager.get_token().await.unwrap().as_str(), "fractional");
    assert_eq!(manager.get_token().await.unwrap().as_str(), "negative");
    // An unusable lifetime leaves the token cached until rejected
    assert_eq!(manager.token().await.unwrap().as_str(), "negative");
}

#[tokio::test]
async fn test_slow_identity_provider_times_out() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("too-late"))
                .set_delay(Duration::from_secs(3)),
        )
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, metrics) = manager_with_timeout("key", &iam, 1);
    let err = manager.get_token().await.unwrap_err();

    assert!(
        matches!(err, AuthError::Timeout { timeout_seconds: 1, .. }),
        "got {:?}",
        err
    );
    assert!(err.to_string().contains(TOKEN_PATH), "message: {}", err);
    assert_eq!(metrics.token_fetch_count(TokenFetchOutcome::Failure), 1);
    assert!(manager.cached().await.is_none());
}

#[tokio::test]
async fn test_non_2xx_is_rejected_with_status_and_body() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_string("Provided API key could not be found"))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, metrics) = manager("bad-key", &iam);
    let err = manager.get_token().await.unwrap_err();

    match err {
        AuthError::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("could not be found"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }
    assert_eq!(metrics.token_fetch_count(TokenFetchOutcome::Failure), 1);
    assert!(manager.cached().await.is_none());
}

#[tokio::test]
async fn test_missing_access_token_is_error() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"token_type": "Bearer"})),
        )
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, AuthError::MissingAccessToken), "got {:?}", err);
}

#[tokio::test]
async fn test_non_json_response_is_malformed() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, AuthError::MalformedResponse(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_demo_mode_never_calls_identity_provider() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("real")))
        .expect(0)
        .mount(&iam)
        .await;

    let (manager, metrics) = manager("DEMO_MODE", &iam);
    for _ in 0..3 {
        assert_eq!(manager.get_token().await.unwrap().as_str(), DEMO_TOKEN);
    }
    assert_eq!(manager.token().await.unwrap().as_str(), DEMO_TOKEN);
    assert_eq!(metrics.token_fetch_count(TokenFetchOutcome::Success), 0);
    assert!(iam.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_token_refreshed_only_once() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("first")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&iam)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("second")))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, metrics) = manager("key", &iam);
    let first = manager.token().await.unwrap();
    assert_eq!(first.as_str(), "first");

    // Two requests both saw "first" rejected; only the first refresh hits IAM
    let refreshed = manager.refresh_after_rejection(&first).await.unwrap();
    let again = manager.refresh_after_rejection(&first).await.unwrap();

    assert_eq!(refreshed.as_str(), "second");
    assert_eq!(again, refreshed);
    assert_eq!(metrics.token_refresh_count(), 1);
}

#[tokio::test]
async fn test_concurrent_rejections_share_one_refresh() {
    let iam = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("first")))
        .up_to_n_times(1)
        .mount(&iam)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("second")))
        .expect(1)
        .mount(&iam)
        .await;

    let (manager, _) = manager("key", &iam);
    let manager = Arc::new(manager);
    let rejected = manager.token().await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let rejected = rejected.clone();
            tokio::spawn(async move { manager.refresh_after_rejection(&rejected).await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token.as_str(), "second");
    }
}
