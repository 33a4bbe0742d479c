//! HTTP client tests against a mock upstream server

use cvmatch::config::{DocumentStoreConfig, EmbeddingConfig};
use cvmatch::documents::{CvStore, DocumentClient};
use cvmatch::embedding::{Embedder, HttpEmbedder, EMBEDDING_DIM};
use cvmatch::error::{Disposition, DocumentError, EmbeddingError, ServiceError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn document_client(server: &MockServer) -> DocumentClient {
    DocumentClient::new(&DocumentStoreConfig {
        base_url: server.uri(),
        timeout_secs: 15,
    })
}

fn embedder(server: &MockServer) -> HttpEmbedder {
    HttpEmbedder::new(EmbeddingConfig {
        url: server.uri(),
        model: "test-embed".to_string(),
        timeout_secs: 5,
    })
}

#[tokio::test]
async fn test_get_cv_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/get_cv/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "cv_id": "abc123",
            "metadata": {"filename": "resume.pdf"},
            "structured_sections": {
                "summary": {"text": "Engineer"},
                "experience": [{"company": "Acme", "bullets": ["Led X"]}],
            }
        })))
        .mount(&server)
        .await;

    let document = document_client(&server).get_cv("abc123").await.unwrap();
    assert_eq!(document.cv_id, "abc123");
    assert_eq!(document.structured_sections.experience.len(), 1);
}

#[tokio::test]
async fn test_get_cv_not_found_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/get_cv/ghost"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = document_client(&server).get_cv("ghost").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Document(DocumentError::NotFound(_))
    ));
    assert_eq!(err.disposition(), Disposition::Discard);
}

#[tokio::test]
async fn test_get_cv_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/get_cv/abc123"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = document_client(&server).get_cv("abc123").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Document(DocumentError::UpstreamStatus { status: 500, .. })
    ));
    assert_eq!(err.disposition(), Disposition::Requeue);
}

#[tokio::test]
async fn test_get_cv_malformed_body_is_poison() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/internal/get_cv/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = document_client(&server).get_cv("abc123").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Document(DocumentError::InvalidPayload(_))
    ));
    assert_eq!(err.disposition(), Disposition::Discard);
}

#[tokio::test]
async fn test_embed_batch_normalizes_and_preserves_order() {
    let server = MockServer::start().await;

    let mut first = vec![0.0f32; EMBEDDING_DIM];
    first[0] = 3.0;
    first[1] = 4.0;
    let mut second = vec![0.0f32; EMBEDDING_DIM];
    second[2] = 2.0;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [first, second] })),
        )
        .mount(&server)
        .await;

    let vectors = embedder(&server)
        .embed_batch(&["alpha".to_string(), "beta".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors.len(), 2);
    assert!((vectors[0][0] - 0.6).abs() < 1e-6);
    assert!((vectors[0][1] - 0.8).abs() < 1e-6);
    assert!((vectors[1][2] - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_embed_rejects_wrong_dimension() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.1, 0.2, 0.3]] })),
        )
        .mount(&server)
        .await;

    let err = embedder(&server).embed("alpha").await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Embedding(EmbeddingError::InvalidDimension { actual: 3, .. })
    ));
}

#[tokio::test]
async fn test_embed_oom_body_is_resource_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&server)
        .await;

    let err = embedder(&server).embed("alpha").await.unwrap_err();
    assert!(err.is_resource_exhausted());
    assert_eq!(err.disposition(), Disposition::Discard);
}

#[tokio::test]
async fn test_embed_plain_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let err = embedder(&server).embed("alpha").await.unwrap_err();
    assert!(!err.is_resource_exhausted());
    assert_eq!(err.disposition(), Disposition::Requeue);
}
