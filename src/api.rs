//! Internal RPC surface
//!
//! Thin HTTP adapter over the retriever and the vector index for the
//! upstream gateway. No business logic lives here: handlers validate,
//! delegate, and serialise. This is also the single place where error
//! kinds map onto HTTP status codes.

use crate::error::{ErrorKind, Result, ServiceError};
use crate::retriever::{ChunkQuery, Retriever};
use crate::vector_store::VectorIndex;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Retrieval front-end
    pub retriever: Arc<Retriever>,
    /// Vector index handle, for résumé removal
    pub index: Arc<dyn VectorIndex>,
}

/// Request to find chunks relevant to a job description
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SimilarChunksRequest {
    /// Job description text
    #[schema(example = "Senior backend engineer, Go and Kubernetes")]
    pub jd_text: String,

    /// Minimum similarity score; chunks below it are dropped
    #[serde(default = "default_min_score")]
    #[schema(example = 0.75)]
    pub min_score: f32,

    /// How many chunks to query from the index before filtering
    #[serde(default = "default_max_chunks_to_query")]
    #[schema(example = 50)]
    pub max_chunks_to_query: usize,

    /// Hard cap on returned chunks
    #[serde(default = "default_max_returned_chunks")]
    #[schema(example = 20)]
    pub max_returned_chunks: usize,

    /// Max chunks accepted per résumé
    #[serde(default = "default_per_cv_limit")]
    #[schema(example = 3)]
    pub per_cv_limit: usize,
}

fn default_min_score() -> f32 {
    crate::retriever::DEFAULT_MIN_SCORE
}

fn default_max_chunks_to_query() -> usize {
    crate::retriever::DEFAULT_MAX_CHUNKS_TO_QUERY
}

fn default_max_returned_chunks() -> usize {
    crate::retriever::DEFAULT_MAX_RETURNED_CHUNKS
}

fn default_per_cv_limit() -> usize {
    crate::retriever::DEFAULT_PER_CV_LIMIT
}

/// One chunk relevant to the job description
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ChunkPayload {
    pub text: String,
    pub section: String,
    pub cv_id: String,
    pub score: f32,
}

/// Response with relevant chunks, best first
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SimilarChunksResponse {
    pub chunks: Vec<ChunkPayload>,
}

/// Request to rank résumés for a job description
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SearchTopKCvsRequest {
    /// Job description text
    pub jd_text: String,

    /// Number of résumés to return
    #[serde(default = "default_top_k")]
    #[schema(example = 3)]
    pub top_k: usize,

    /// Chunk pool size aggregated before ranking
    #[serde(default = "default_raw_top_k")]
    #[schema(example = 30)]
    pub raw_top_k: usize,
}

fn default_top_k() -> usize {
    crate::retriever::DEFAULT_TOP_K
}

fn default_raw_top_k() -> usize {
    crate::retriever::DEFAULT_RAW_TOP_K
}

/// One ranked résumé
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CvScorePayload {
    pub cv_id: String,
    pub score: f32,
}

/// Response with ranked résumés
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SearchTopKCvsResponse {
    pub cvs: Vec<CvScorePayload>,
}

/// Response after removing a résumé from the index
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DeleteCvResponse {
    pub cv_id: String,
    pub deleted: bool,
}

/// Health check response
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status
    #[schema(example = "ok")]
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// API error carrying the failing component's context
#[derive(Debug)]
pub struct ApiError {
    context: &'static str,
    source: ServiceError,
}

impl ApiError {
    fn new(context: &'static str, source: ServiceError) -> Self {
        Self { context, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.source.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::UpstreamTransient => StatusCode::BAD_GATEWAY,
            ErrorKind::ResourceExhausted | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            error: format!("{}: {}", self.context, self.source),
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        similar_chunks_handler,
        search_top_k_cvs_handler,
        delete_cv_handler,
    ),
    components(
        schemas(
            SimilarChunksRequest,
            SimilarChunksResponse,
            ChunkPayload,
            SearchTopKCvsRequest,
            SearchTopKCvsResponse,
            CvScorePayload,
            DeleteCvResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "internal", description = "Internal retrieval endpoints")
    ),
    info(
        title = "cvmatch internal API",
        description = "Internal retrieval surface for the résumé matching platform"
    )
)]
struct ApiDoc;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/internal/similar_chunks", post(similar_chunks_handler))
        .route("/internal/search_top_k_cvs", post(search_top_k_cvs_handler))
        .route("/internal/cv/{cv_id}", delete(delete_cv_handler))
        .route("/api-docs/openapi.json", get(openapi_spec_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn start_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let router = create_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("RPC surface listening on {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}

/// OpenAPI specification endpoint
async fn openapi_spec_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// Find résumé chunks relevant to a job description
#[utoipa::path(
    post,
    path = "/internal/similar_chunks",
    tag = "internal",
    request_body = SimilarChunksRequest,
    responses(
        (status = 200, description = "Relevant chunks above the threshold", body = SimilarChunksResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn similar_chunks_handler(
    State(state): State<AppState>,
    Json(request): Json<SimilarChunksRequest>,
) -> ApiResult<Json<SimilarChunksResponse>> {
    let query = ChunkQuery {
        min_score: request.min_score,
        max_chunks_to_query: request.max_chunks_to_query,
        max_returned_chunks: request.max_returned_chunks,
        per_cv_limit: request.per_cv_limit,
    };

    let hits = state
        .retriever
        .find_similar_chunks(&request.jd_text, &query)
        .await
        .map_err(|e| ApiError::new("Failed to find similar chunks", e))?;

    Ok(Json(SimilarChunksResponse {
        chunks: hits
            .into_iter()
            .map(|hit| ChunkPayload {
                text: hit.text,
                section: hit.section,
                cv_id: hit.cv_id,
                score: hit.score,
            })
            .collect(),
    }))
}

/// Rank résumés for a job description
#[utoipa::path(
    post,
    path = "/internal/search_top_k_cvs",
    tag = "internal",
    request_body = SearchTopKCvsRequest,
    responses(
        (status = 200, description = "Ranked résumés", body = SearchTopKCvsResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn search_top_k_cvs_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchTopKCvsRequest>,
) -> ApiResult<Json<SearchTopKCvsResponse>> {
    let hits = state
        .retriever
        .search_top_k_cvs(&request.jd_text, request.top_k, request.raw_top_k)
        .await
        .map_err(|e| ApiError::new("Failed to search top CVs", e))?;

    Ok(Json(SearchTopKCvsResponse {
        cvs: hits
            .into_iter()
            .map(|hit| CvScorePayload {
                cv_id: hit.cv_id,
                score: hit.score,
            })
            .collect(),
    }))
}

/// Remove a résumé's vectors from the index
#[utoipa::path(
    delete,
    path = "/internal/cv/{cv_id}",
    tag = "internal",
    params(
        ("cv_id" = String, Path, description = "Résumé content id")
    ),
    responses(
        (status = 200, description = "Vectors removed", body = DeleteCvResponse),
        (status = 502, description = "Upstream failure", body = ErrorResponse)
    )
)]
async fn delete_cv_handler(
    State(state): State<AppState>,
    Path(cv_id): Path<String>,
) -> ApiResult<Json<DeleteCvResponse>> {
    state
        .index
        .delete_by_cv(&cv_id)
        .await
        .map_err(|e| ApiError::new("Failed to delete CV vectors", e))?;

    Ok(Json(DeleteCvResponse {
        cv_id,
        deleted: true,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DocumentError, EmbeddingError};

    fn status_of(err: ServiceError) -> StatusCode {
        ApiError::new("test", err).into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_of(ServiceError::InvalidInput("blank".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(DocumentError::NotFound("x".to_string()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DocumentError::ConnectionFailed("down".to_string()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(EmbeddingError::ResourceExhausted("oom".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ServiceError::Config("bad".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_request_defaults() {
        let request: SimilarChunksRequest =
            serde_json::from_str(r#"{"jd_text": "engineer"}"#).unwrap();
        assert_eq!(request.min_score, 0.75);
        assert_eq!(request.max_chunks_to_query, 50);
        assert_eq!(request.per_cv_limit, 3);

        let request: SearchTopKCvsRequest =
            serde_json::from_str(r#"{"jd_text": "engineer"}"#).unwrap();
        assert_eq!(request.top_k, 3);
        assert_eq!(request.raw_top_k, 30);
    }
}
