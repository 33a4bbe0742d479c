//! Vector index adapter
//!
//! Wraps the external managed vector index behind the [`VectorIndex`]
//! trait: batched idempotent upserts, cosine top-k queries with
//! metadata, and delete-by-résumé. Also owns index bootstrap: the
//! index is created on first use and a dimension mismatch against an
//! existing non-empty index is a hard start-up failure.

use crate::chunker::Chunk;
use crate::config::VectorStoreConfig;
use crate::embedding::EMBEDDING_DIM;
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

/// Records per upsert request; the store caps batch size at 100
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Stored `text` metadata is capped at 1000 chars to stay inside the
/// store's per-record metadata limit
pub const MAX_TEXT_METADATA_CHARS: usize = 1000;

/// Any other stringified metadata value is capped at 500 chars
pub const MAX_EXTRA_METADATA_CHARS: usize = 500;

/// One vector plus its retrieval metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: BTreeMap<String, Value>,
}

/// One query match, score in cosine space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl QueryMatch {
    /// String metadata accessor; missing or non-string values read as ""
    pub fn metadata_str(&self, key: &str) -> &str {
        self.metadata
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

/// Trait for the external vector index
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert-or-overwrite records keyed by id
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Top-k nearest records by cosine similarity, metadata included,
    /// ordered by score descending
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;

    /// Remove every record belonging to a résumé
    async fn delete_by_cv(&self, cv_id: &str) -> Result<()>;
}

/// Deterministic record id: re-indexing the same résumé rewrites the
/// same ids, so duplicate event deliveries overwrite instead of
/// appending
pub fn record_id(cv_id: &str, section: &str, ordinal: usize) -> String {
    format!("{cv_id}:{section}:{ordinal}")
}

/// Pair chunks with their embeddings and build upsert-ready records.
/// Ordinals count within each section so ids stay stable across runs.
pub fn records_from_chunks(chunks: &[Chunk], embeddings: Vec<Vec<f32>>) -> Vec<VectorRecord> {
    let mut ordinals: HashMap<&str, usize> = HashMap::new();

    chunks
        .iter()
        .zip(embeddings)
        .map(|(chunk, values)| {
            let ordinal = ordinals.entry(chunk.section.as_str()).or_insert(0);
            let id = record_id(&chunk.cv_id, &chunk.section, *ordinal);
            *ordinal += 1;

            let mut metadata = BTreeMap::new();
            metadata.insert(
                "cv_id".to_string(),
                Value::String(chunk.cv_id.clone()),
            );
            metadata.insert(
                "section".to_string(),
                Value::String(chunk.section.clone()),
            );
            metadata.insert(
                "text".to_string(),
                Value::String(truncate_chars(&chunk.text, MAX_TEXT_METADATA_CHARS)),
            );
            for (key, value) in &chunk.metadata {
                if key == "cv_id" || key == "section" || key == "text" {
                    continue;
                }
                metadata.insert(key.clone(), sanitize_metadata_value(value));
            }

            VectorRecord {
                id,
                values,
                metadata,
            }
        })
        .collect()
}

/// Metadata values must be scalars; structured values are stringified
/// and every string form is capped
fn sanitize_metadata_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_chars(s, MAX_EXTRA_METADATA_CHARS)),
        Value::Number(_) | Value::Bool(_) => value.clone(),
        other => Value::String(truncate_chars(&other.to_string(), MAX_EXTRA_METADATA_CHARS)),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Managed vector index reached over its REST API
pub struct PineconeIndex {
    client: reqwest::Client,
    config: VectorStoreConfig,
    /// Data-plane host assigned to the index
    host: String,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    dimension: usize,
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec<'a>,
}

#[derive(Debug, Serialize)]
struct IndexSpec<'a> {
    serverless: ServerlessSpec<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "totalVectorCount", default)]
    total_vector_count: usize,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    filter: Value,
    namespace: &'a str,
}

impl PineconeIndex {
    /// Connect to the configured index, creating or validating it.
    ///
    /// An existing index with the wrong dimension is dropped and
    /// recreated only when it holds zero records; otherwise this is a
    /// hard error and the service must not start.
    pub async fn connect(config: VectorStoreConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(VectorStoreError::ConnectionFailed(
                "vector store API key is not configured".to_string(),
            )
            .into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        let mut index = Self {
            client,
            config,
            host: String::new(),
        };
        index.ensure_index().await?;
        Ok(index)
    }

    async fn ensure_index(&mut self) -> Result<()> {
        match self.describe_index().await? {
            None => {
                info!(
                    index = %self.config.index_name,
                    dimension = EMBEDDING_DIM,
                    "Vector index does not exist; creating"
                );
                self.create_index().await?;
            }
            Some(description) if description.dimension != EMBEDDING_DIM => {
                self.host = normalize_host(&description.host);
                let records = self.total_record_count().await?;
                if records > 0 {
                    return Err(VectorStoreError::DimensionMismatch {
                        expected: EMBEDDING_DIM,
                        actual: description.dimension,
                        records,
                    }
                    .into());
                }
                warn!(
                    index = %self.config.index_name,
                    existing = description.dimension,
                    required = EMBEDDING_DIM,
                    "Empty index has wrong dimension; recreating"
                );
                self.delete_index().await?;
                self.create_index().await?;
            }
            Some(description) => {
                self.host = normalize_host(&description.host);
                if !description.status.ready {
                    self.wait_until_ready().await?;
                }
                info!(
                    index = %self.config.index_name,
                    dimension = description.dimension,
                    "Connected to vector index"
                );
            }
        }
        Ok(())
    }

    async fn describe_index(&self) -> Result<Option<IndexDescription>> {
        let url = format!(
            "{}/indexes/{}",
            self.config.control_plane_url.trim_end_matches('/'),
            self.config.index_name
        );
        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::ConnectionFailed(format!(
                "describe returned {status}: {body}"
            ))
            .into());
        }

        let description: IndexDescription = response
            .json()
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;
        Ok(Some(description))
    }

    async fn create_index(&mut self) -> Result<()> {
        let url = format!(
            "{}/indexes",
            self.config.control_plane_url.trim_end_matches('/')
        );
        let request = CreateIndexRequest {
            name: &self.config.index_name,
            dimension: EMBEDDING_DIM,
            metric: "cosine",
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: &self.config.cloud,
                    region: &self.config.region,
                },
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorStoreError::ConnectionFailed(format!(
                "create returned {status}: {body}"
            ))
            .into());
        }

        self.wait_until_ready().await?;
        info!(index = %self.config.index_name, "Vector index created");
        Ok(())
    }

    async fn delete_index(&self) -> Result<()> {
        let url = format!(
            "{}/indexes/{}",
            self.config.control_plane_url.trim_end_matches('/'),
            self.config.index_name
        );
        let response = self
            .client
            .delete(&url)
            .header("Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(VectorStoreError::ConnectionFailed(format!(
                "delete index returned {status}"
            ))
            .into());
        }
        Ok(())
    }

    /// Poll describe until the control plane reports the index ready
    async fn wait_until_ready(&mut self) -> Result<()> {
        for _ in 0..60 {
            if let Some(description) = self.describe_index().await? {
                if description.status.ready {
                    self.host = normalize_host(&description.host);
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        Err(VectorStoreError::NotReady(format!(
            "index {} did not become ready",
            self.config.index_name
        ))
        .into())
    }

    async fn total_record_count(&self) -> Result<usize> {
        let url = format!("{}/describe_index_stats", self.host);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(VectorStoreError::ConnectionFailed(format!(
                "stats returned {status}"
            ))
            .into());
        }

        let stats: StatsResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::ConnectionFailed(e.to_string()))?;
        Ok(stats.total_vector_count)
    }

    fn check_dimension(values: &[f32]) -> Result<()> {
        if values.len() != EMBEDDING_DIM {
            return Err(VectorStoreError::InvalidDimension {
                expected: EMBEDDING_DIM,
                actual: values.len(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No records to upsert");
            return Ok(());
        }
        for record in &records {
            Self::check_dimension(&record.values)?;
        }

        let url = format!("{}/vectors/upsert", self.host);
        let total_batches = records.len().div_ceil(UPSERT_BATCH_SIZE);

        for (batch_number, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            let request = UpsertRequest {
                vectors: batch,
                namespace: &self.config.namespace,
            };
            let response = self
                .client
                .post(&url)
                .header("Api-Key", &self.config.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| VectorStoreError::UpsertFailed(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(VectorStoreError::UpsertFailed(format!(
                    "batch {}/{total_batches} returned {status}: {body}",
                    batch_number + 1
                ))
                .into());
            }
            debug!(
                batch = batch_number + 1,
                total = total_batches,
                size = batch.len(),
                "Upserted batch"
            );
        }

        info!(records = records.len(), "Upserted records to vector index");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        Self::check_dimension(vector)?;

        let url = format!("{}/query", self.host);
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: &self.config.namespace,
        };

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VectorStoreError::QueryFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(
                VectorStoreError::QueryFailed(format!("query returned {status}: {body}")).into(),
            );
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| VectorStoreError::QueryFailed(e.to_string()))?;
        Ok(parsed.matches)
    }

    async fn delete_by_cv(&self, cv_id: &str) -> Result<()> {
        let url = format!("{}/vectors/delete", self.host);
        let request = DeleteRequest {
            filter: serde_json::json!({ "cv_id": { "$eq": cv_id } }),
            namespace: &self.config.namespace,
        };

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| VectorStoreError::DeleteFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(
                VectorStoreError::DeleteFailed(format!("delete returned {status}: {body}")).into(),
            );
        }

        info!(cv_id, "Deleted résumé vectors");
        Ok(())
    }
}

/// The control plane reports a bare host; data-plane calls need a scheme
fn normalize_host(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk_resume;
    use crate::resume::CvDocument;

    fn sample_chunks() -> Vec<Chunk> {
        let doc: CvDocument = serde_json::from_value(serde_json::json!({
            "cv_id": "cv1",
            "structured_sections": {
                "experience": [{"company": "Acme", "bullets": ["Led X", "Built Y"]}],
                "summary": {"text": "S"},
            }
        }))
        .unwrap();
        chunk_resume("cv1", &doc.structured_sections)
    }

    fn zeros(n: usize) -> Vec<Vec<f32>> {
        vec![vec![0.0; EMBEDDING_DIM]; n]
    }

    #[test]
    fn test_record_id_scheme() {
        assert_eq!(record_id("cv1", "experience", 0), "cv1:experience:0");
        assert_eq!(record_id("cv1", "experience", 0), record_id("cv1", "experience", 0));
    }

    #[test]
    fn test_ordinals_count_within_section() {
        let chunks = sample_chunks();
        let records = records_from_chunks(&chunks, zeros(chunks.len()));

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["cv1:experience:0", "cv1:experience:1", "cv1:summary:0"]);
    }

    #[test]
    fn test_reindexing_produces_same_ids() {
        let chunks = sample_chunks();
        let first: Vec<String> = records_from_chunks(&chunks, zeros(chunks.len()))
            .into_iter()
            .map(|r| r.id)
            .collect();
        let second: Vec<String> = records_from_chunks(&chunks, zeros(chunks.len()))
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_required_metadata_present() {
        let chunks = sample_chunks();
        for record in records_from_chunks(&chunks, zeros(chunks.len())) {
            assert!(!record.metadata["cv_id"].as_str().unwrap().is_empty());
            assert!(!record.metadata["section"].as_str().unwrap().is_empty());
            assert!(record.metadata.contains_key("text"));
        }
    }

    #[test]
    fn test_text_truncated_to_limit() {
        let mut chunks = sample_chunks();
        chunks[0].text = "x".repeat(5000);
        let records = records_from_chunks(&chunks, zeros(chunks.len()));
        assert_eq!(
            records[0].metadata["text"].as_str().unwrap().chars().count(),
            MAX_TEXT_METADATA_CHARS
        );
    }

    #[test]
    fn test_metadata_value_sanitization() {
        assert_eq!(
            sanitize_metadata_value(&Value::from(7)),
            Value::from(7)
        );
        assert_eq!(
            sanitize_metadata_value(&Value::from(true)),
            Value::from(true)
        );

        let long = "y".repeat(900);
        let truncated = sanitize_metadata_value(&Value::String(long));
        assert_eq!(
            truncated.as_str().unwrap().chars().count(),
            MAX_EXTRA_METADATA_CHARS
        );

        let listy = sanitize_metadata_value(&serde_json::json!(["Rust", "Go"]));
        assert_eq!(listy, Value::String("[\"Rust\",\"Go\"]".to_string()));
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("idx-abc.svc.pinecone.io"), "https://idx-abc.svc.pinecone.io");
        assert_eq!(normalize_host("https://idx.example/"), "https://idx.example");
    }
}
