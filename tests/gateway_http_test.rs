//! End-to-end HTTP surface tests driven through the axum router directly via
//! `tower::ServiceExt::oneshot`, without a bound TCP listener or a real
//! browser binding.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use weblinq_gateway::browser::{BrowserBinding, ChromiumoxideBinding, SessionPool};
use weblinq_gateway::clock::SystemClock;
use weblinq_gateway::config::GatewayConfig;
use weblinq_gateway::credit::CreditLedger;
use weblinq_gateway::gateway::auth::StaticKeyResolver;
use weblinq_gateway::gateway::{router, AppState};
use weblinq_gateway::search::{SearchAggregator, SearchRateLimiter};
use weblinq_gateway::user_actor::Registry;

fn test_state(user_id: &str, api_key: &str) -> AppState {
    let binding: Arc<dyn BrowserBinding> = Arc::new(ChromiumoxideBinding::new(1, 0, true));
    let pool = Arc::new(SessionPool::new(binding, std::time::Duration::from_secs(600)));

    let dir = tempfile::tempdir().unwrap();
    let artifacts_backend = Arc::new(
        object_store::local::LocalFileSystem::new_with_prefix(dir.path()).unwrap(),
    );
    let artifacts = weblinq_gateway::artifact_store::ArtifactStore::new(artifacts_backend, "cdn.test".to_string());
    let clock: Arc<dyn weblinq_gateway::clock::Clock> = Arc::new(SystemClock);
    let user_actors = Registry::new(dir.into_path(), artifacts, clock);

    let mut keys = HashMap::new();
    keys.insert(api_key.to_string(), user_id.to_string());

    AppState {
        pool,
        credit: CreditLedger::new(),
        user_actors,
        search: Arc::new(SearchAggregator::new(SearchRateLimiter::default())),
        auth: Arc::new(StaticKeyResolver::new(keys)),
        config: Arc::new(GatewayConfig::default()),
    }
}

#[tokio::test]
async fn missing_bearer_token_is_rejected_with_401() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/markdown")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"https://example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_url_is_rejected_with_422_before_auth_is_even_checked() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/markdown")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"url":"not-a-url"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn wait_time_above_5000ms_is_rejected() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/markdown")
                .header("content-type", "application/json")
                .header("authorization", "Bearer key-1")
                .body(Body::from(r#"{"url":"https://example.com","waitTime":9000}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn search_query_limit_out_of_range_is_rejected() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/search")
                .header("content-type", "application/json")
                .header("authorization", "Bearer key-1")
                .body(Body::from(r#"{"query":"rust async runtimes","limit":99}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn json_extraction_text_without_prompt_is_rejected() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/web/json-extraction")
                .header("content-type", "application/json")
                .header("authorization", "Bearer key-1")
                .body(Body::from(r#"{"url":"https://example.com","responseType":"text"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn get_unknown_file_returns_404() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/files/nonexistent")
                .header("authorization", "Bearer key-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_files_for_fresh_user_is_empty() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/files")
                .header("authorization", "Bearer key-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["files"], serde_json::json!([]));
    assert_eq!(parsed["totalFiles"], 0);
    assert_eq!(parsed["hasMore"], false);
}

#[tokio::test]
async fn wrong_api_key_is_rejected_with_401() {
    let app = router(test_state("user-1", "key-1"));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/files")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
