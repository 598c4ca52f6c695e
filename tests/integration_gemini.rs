#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

use product_cache::config::EmbeddingConfig;
use product_cache::embeddings::{EmbeddingProvider, GeminiClient};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT_PATH: &str = "/v1beta/models/gemini-embedding-001:batchEmbedContents";

fn client_for(server_uri: &str) -> GeminiClient {
    let config = EmbeddingConfig {
        base_url: server_uri.to_string(),
        model: "gemini-embedding-001".to_string(),
        api_key_env: "UNUSED_IN_TESTS".to_string(),
        dimension: 4,
        retry_attempts: 2,
        retry_delay_seconds: 0,
    };
    GeminiClient::with_api_key(&config, "test-key".to_string())
        .expect("should create test client")
}

#[tokio::test(flavor = "multi_thread")]
async fn batch_embedding_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [
                {"values": [1.0, 0.0, 0.0, 0.0]},
                {"values": [0.0, 1.0, 0.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let vectors = tokio::task::spawn_blocking(move || {
        client.embed_texts(&["red can".to_string(), "green bottle".to_string()])
    })
    .await
    .expect("task should not panic")
    .expect("embedding should succeed");

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], vec![1.0, 0.0, 0.0, 0.0]);
    assert_eq!(vectors[1], vec![0.0, 1.0, 0.0, 0.0]);
}

#[tokio::test(flavor = "multi_thread")]
async fn trait_object_usage() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [{"values": [0.5, 0.5, 0.5, 0.5]}]
        })))
        .mount(&server)
        .await;

    let provider: Box<dyn EmbeddingProvider + Send> = Box::new(client_for(&server.uri()));
    assert_eq!(provider.dimension(), 4);

    let vectors = tokio::task::spawn_blocking(move || provider.embed(&["query".to_string()]))
        .await
        .expect("task should not panic")
        .expect("embedding should succeed");
    assert_eq!(vectors, vec![vec![0.5, 0.5, 0.5, 0.5]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    // first attempt fails with a 500, the retry succeeds
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [{"values": [1.0, 0.0, 0.0, 0.0]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let vectors = tokio::task::spawn_blocking(move || client.embed_texts(&["query".to_string()]))
        .await
        .expect("task should not panic")
        .expect("embedding should succeed after retry");

    assert_eq!(vectors.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn retries_are_bounded() {
    let server = MockServer::start().await;

    // 1 initial attempt + 2 retries, then the error propagates
    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let result = tokio::task::spawn_blocking(move || client.embed_texts(&["query".to_string()]))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let result = tokio::task::spawn_blocking(move || client.embed_texts(&["query".to_string()]))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn response_count_mismatch_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [{"values": [1.0, 0.0, 0.0, 0.0]}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let result = tokio::task::spawn_blocking(move || {
        client.embed_texts(&["one".to_string(), "two".to_string()])
    })
    .await
    .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn response_dimension_mismatch_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "embeddings": [{"values": [1.0, 0.0]}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let result = tokio::task::spawn_blocking(move || client.embed_texts(&["query".to_string()]))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}
