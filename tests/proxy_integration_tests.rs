// tests/proxy_integration_tests.rs

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{body_json, body_text, TestApp, TestConfigBuilder};
use tower::util::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn generate(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(GENERATE_PATH)
        .header("content-type", "application/json")
        .header("x-goog-api-key", "caller-supplied")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn proxies_with_current_pool_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "k1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"candidates":[{"content":"hi"}]}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfigBuilder::new().with_target_url(server.uri()).build();
    let app = TestApp::new(config, &["k1", "k2"]);

    let response = app.router.oneshot(generate(r#"{"contents":[]}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let json = body_json(response).await;
    assert_eq!(json["candidates"][0]["content"], "hi");
}

#[tokio::test]
async fn rate_limited_key_is_rotated_transparently() {
    let server = MockServer::start().await;
    Mock::given(header("x-goog-api-key", "k1"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(header("x-goog-api-key", "k2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("from k2"))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfigBuilder::new().with_target_url(server.uri()).build();
    let app = TestApp::new(config, &["k1", "k2"]);

    let response = app.router.oneshot(generate("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "from k2");
    assert_eq!(app.pool.status().current_key_index, Some(1));
    assert_eq!(app.store.save_count(), 2);
}

#[tokio::test]
async fn exhausted_retries_answer_429_problem() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&server)
        .await;

    let config = TestConfigBuilder::new()
        .with_target_url(server.uri())
        .with_max_attempts(2)
        .build();
    let app = TestApp::new(config, &["only"]);

    let response = app.router.oneshot(generate("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["status"], 429);
    assert!(json["detail"]
        .as_str()
        .unwrap()
        .contains("Exhausted retries with key rotation after 2 attempt(s)"));
}

#[tokio::test]
async fn upstream_rejection_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":{"message":"bad prompt"}}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfigBuilder::new().with_target_url(server.uri()).build();
    let app = TestApp::new(config, &["k1", "k2"]);

    let response = app.router.oneshot(generate("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()["content-type"], "application/json");
    let json = body_json(response).await;
    assert_eq!(json["error"]["message"], "bad prompt");
    assert_eq!(app.pool.current_key().as_deref(), Some("k1"));
}

#[tokio::test]
async fn empty_pool_answers_503_without_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfigBuilder::new().with_target_url(server.uri()).build();
    let app = TestApp::new(config, &[]);

    let response = app.router.oneshot(generate("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
