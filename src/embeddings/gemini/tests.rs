use super::*;

fn test_config() -> EmbeddingConfig {
    EmbeddingConfig {
        base_url: "http://localhost:9999".to_string(),
        model: "gemini-embedding-001".to_string(),
        api_key_env: "TEST_GEMINI_KEY".to_string(),
        dimension: 8,
        retry_attempts: 2,
        retry_delay_seconds: 0,
    }
}

#[test]
fn client_configuration() {
    let client = GeminiClient::with_api_key(&test_config(), "secret".to_string())
        .expect("Failed to create client");

    assert_eq!(client.model, "gemini-embedding-001");
    assert_eq!(client.dimension, 8);
    assert_eq!(client.api_key, "secret");
    assert_eq!(client.retry_attempts, 2);
    assert_eq!(client.retry_delay, Duration::from_secs(0));
    assert_eq!(
        client.endpoint.as_str(),
        "http://localhost:9999/v1beta/models/gemini-embedding-001:batchEmbedContents"
    );
}

#[test]
fn client_builder_methods() {
    let client = GeminiClient::with_api_key(&test_config(), "secret".to_string())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5)
        .with_retry_delay(Duration::from_millis(10));

    assert_eq!(client.retry_attempts, 5);
    assert_eq!(client.retry_delay, Duration::from_millis(10));
}

#[test]
fn batch_request_shape() {
    let request = BatchEmbedRequest {
        requests: vec![EmbedContentRequest {
            model: "models/gemini-embedding-001".to_string(),
            content: Content {
                parts: vec![Part {
                    text: "red can 355ml".to_string(),
                }],
            },
            output_dimensionality: 768,
        }],
    };

    let json = serde_json::to_value(&request).expect("should serialize request");
    assert_eq!(
        json["requests"][0]["model"],
        "models/gemini-embedding-001"
    );
    assert_eq!(
        json["requests"][0]["content"]["parts"][0]["text"],
        "red can 355ml"
    );
    assert_eq!(json["requests"][0]["outputDimensionality"], 768);
}

#[test]
fn batch_response_parsing() {
    let body = r#"{"embeddings":[{"values":[0.1,0.2]},{"values":[0.3,0.4]}]}"#;
    let response: BatchEmbedResponse =
        serde_json::from_str(body).expect("should parse response");

    assert_eq!(response.embeddings.len(), 2);
    assert_eq!(response.embeddings[0].values, vec![0.1, 0.2]);
    assert_eq!(response.embeddings[1].values, vec![0.3, 0.4]);
}

#[test]
fn empty_batch_skips_request() {
    let client = GeminiClient::with_api_key(&test_config(), "secret".to_string())
        .expect("Failed to create client");

    // No server is running on the configured port; an empty input must not
    // reach the network at all.
    let vectors = client.embed_texts(&[]).expect("empty batch should succeed");
    assert!(vectors.is_empty());
}
