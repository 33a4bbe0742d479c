//! Event-driven indexing pipeline
//!
//! Consumes `cv.created` events from the durable stream and runs each
//! résumé through fetch → chunk → embed → upsert. One message is in
//! flight at a time; outcomes are resolved purely through ack/nak so
//! failures never escape the consumer. Deterministic record ids make
//! redelivered events overwrite rather than duplicate.

use crate::chunker::chunk_resume;
use crate::config::QueueConfig;
use crate::documents::CvStore;
use crate::embedding::Embedder;
use crate::error::{Disposition, Result, ServiceError};
use crate::vector_store::{records_from_chunks, VectorIndex};
use async_nats::jetstream::{self, consumer::AckPolicy, AckKind};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Payload of a `cv.created` event
#[derive(Debug, Deserialize)]
pub struct IndexEvent {
    #[serde(default)]
    pub cv_id: String,
}

/// Indexing pipeline over the shared document, embedding, and index
/// handles
pub struct Indexer {
    documents: Arc<dyn CvStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Indexer {
    pub fn new(
        documents: Arc<dyn CvStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            documents,
            embedder,
            index,
        }
    }

    /// Parse an event payload and index the résumé it references
    pub async fn process_event(&self, payload: &[u8]) -> Result<()> {
        let event: IndexEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::InvalidInput(format!("malformed event payload: {e}")))?;

        if event.cv_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "no cv_id in message".to_string(),
            ));
        }

        self.process_cv(event.cv_id.trim()).await
    }

    /// Fetch, chunk, embed, and upsert one résumé
    pub async fn process_cv(&self, cv_id: &str) -> Result<()> {
        info!(cv_id, "Processing résumé for indexing");

        let document = self.documents.get_cv(cv_id).await?;
        let chunks = chunk_resume(cv_id, &document.structured_sections);

        if chunks.is_empty() {
            warn!(cv_id, "Résumé produced no chunks; nothing to index");
            return Ok(());
        }
        debug!(cv_id, chunks = chunks.len(), "Chunked résumé");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records = records_from_chunks(&chunks, embeddings);
        self.index.upsert(records).await?;

        info!(cv_id, chunks = chunks.len(), "Résumé indexed");
        Ok(())
    }
}

/// Run the consumer until the process exits, reconnecting with a
/// fixed backoff whenever the broker connection or subscription fails
pub async fn run_consumer(indexer: Arc<Indexer>, config: QueueConfig) {
    let delay = Duration::from_secs(config.reconnect_delay_secs.max(5));
    loop {
        if let Err(err) = consume(&indexer, &config).await {
            error!(
                error = %err,
                url = %config.url,
                stream = %config.stream,
                "Consumer failed; reconnecting in {}s",
                delay.as_secs()
            );
        } else {
            warn!(
                url = %config.url,
                stream = %config.stream,
                "Consumer stream ended; reconnecting in {}s",
                delay.as_secs()
            );
        }
        tokio::time::sleep(delay).await;
    }
}

async fn consume(indexer: &Indexer, config: &QueueConfig) -> Result<()> {
    info!(
        url = %config.url,
        stream = %config.stream,
        subject = %config.subject,
        "Connecting to event stream"
    );

    let client = async_nats::connect(config.url.as_str())
        .await
        .map_err(|e| ServiceError::Queue(e.to_string()))?;
    let context = jetstream::new(client);

    let stream = context
        .get_or_create_stream(jetstream::stream::Config {
            name: config.stream.clone(),
            subjects: vec![config.subject.clone().into()],
            ..Default::default()
        })
        .await
        .map_err(|e| ServiceError::Queue(e.to_string()))?;

    // One unacked message per consumer instance keeps dispatch fair
    // across parallel indexers.
    let consumer = stream
        .get_or_create_consumer(
            &config.durable_name,
            jetstream::consumer::pull::Config {
                durable_name: Some(config.durable_name.clone()),
                ack_policy: AckPolicy::Explicit,
                max_ack_pending: 1,
                ..Default::default()
            },
        )
        .await
        .map_err(|e| ServiceError::Queue(e.to_string()))?;

    info!("Consumer started; waiting for events");

    let mut messages = consumer
        .messages()
        .await
        .map_err(|e| ServiceError::Queue(e.to_string()))?;

    while let Some(message) = messages.next().await {
        let message = message.map_err(|e| ServiceError::Queue(e.to_string()))?;
        handle_message(indexer, message).await;
    }

    Ok(())
}

/// Resolve one message to a terminal ack state. Never returns an
/// error: every failure maps onto redeliver-or-discard.
async fn handle_message(indexer: &Indexer, message: jetstream::Message) {
    match indexer.process_event(&message.payload).await {
        Ok(()) => {
            if let Err(err) = message.ack().await {
                warn!(error = %err, "Failed to ack processed message");
            }
        }
        Err(err) => {
            if err.is_resource_exhausted() {
                error!(
                    error = %err,
                    "CRITICAL: resource exhaustion while indexing; dropping event to protect the queue"
                );
            }
            let ack = match err.disposition() {
                Disposition::Requeue => {
                    warn!(error = %err, category = err.category(), "Indexing failed; requeueing event");
                    AckKind::Nak(None)
                }
                Disposition::Discard => {
                    error!(error = %err, category = err.category(), "Indexing failed terminally; discarding event");
                    AckKind::Term
                }
            };
            if let Err(err) = message.ack_with(ack).await {
                warn!(error = %err, "Failed to nack message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::MockCvStore;
    use crate::embedding::{MockEmbedder, EMBEDDING_DIM};
    use crate::error::{DocumentError, EmbeddingError};
    use crate::resume::CvDocument;
    use crate::vector_store::MockVectorIndex;

    fn sample_document(cv_id: &str) -> CvDocument {
        serde_json::from_value(serde_json::json!({
            "cv_id": cv_id,
            "structured_sections": {
                "experience": [{"company": "Acme", "bullets": ["Led X", "Built Y"]}],
                "summary": {"text": "Backend engineer."},
            }
        }))
        .unwrap()
    }

    fn indexer(
        documents: MockCvStore,
        embedder: MockEmbedder,
        index: MockVectorIndex,
    ) -> Indexer {
        Indexer::new(Arc::new(documents), Arc::new(embedder), Arc::new(index))
    }

    #[tokio::test]
    async fn test_process_event_happy_path() {
        let mut documents = MockCvStore::new();
        documents
            .expect_get_cv()
            .returning(|cv_id| Ok(sample_document(cv_id)));

        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed_batch()
            .returning(|texts| Ok(vec![vec![0.1; EMBEDDING_DIM]; texts.len()]));

        let mut index = MockVectorIndex::new();
        index
            .expect_upsert()
            .withf(|records| {
                records.len() == 3
                    && records[0].id == "cv42:experience:0"
                    && records[1].id == "cv42:experience:1"
                    && records[2].id == "cv42:summary:0"
            })
            .returning(|_| Ok(()));

        let indexer = indexer(documents, embedder, index);
        indexer
            .process_event(br#"{"cv_id": "cv42"}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_cv_id_is_poison() {
        let indexer = indexer(
            MockCvStore::new(),
            MockEmbedder::new(),
            MockVectorIndex::new(),
        );

        let err = indexer.process_event(b"{}").await.unwrap_err();
        assert_eq!(err.disposition(), Disposition::Discard);

        let err = indexer.process_event(b"not json").await.unwrap_err();
        assert_eq!(err.disposition(), Disposition::Discard);
    }

    #[tokio::test]
    async fn test_document_not_found_is_poison() {
        let mut documents = MockCvStore::new();
        documents
            .expect_get_cv()
            .returning(|cv_id| Err(DocumentError::NotFound(cv_id.to_string()).into()));

        let indexer = indexer(documents, MockEmbedder::new(), MockVectorIndex::new());
        let err = indexer
            .process_event(br#"{"cv_id": "gone"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.disposition(), Disposition::Discard);
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_requeues() {
        let mut documents = MockCvStore::new();
        documents.expect_get_cv().returning(|_| {
            Err(DocumentError::ConnectionFailed("connection reset".to_string()).into())
        });

        let indexer = indexer(documents, MockEmbedder::new(), MockVectorIndex::new());
        let err = indexer
            .process_event(br#"{"cv_id": "cv1"}"#)
            .await
            .unwrap_err();
        assert_eq!(err.disposition(), Disposition::Requeue);
    }

    #[tokio::test]
    async fn test_embedding_oom_is_poison() {
        let mut documents = MockCvStore::new();
        documents
            .expect_get_cv()
            .returning(|cv_id| Ok(sample_document(cv_id)));

        let mut embedder = MockEmbedder::new();
        embedder.expect_embed_batch().returning(|_| {
            Err(EmbeddingError::ResourceExhausted("CUDA out of memory".to_string()).into())
        });

        let indexer = indexer(documents, embedder, MockVectorIndex::new());
        let err = indexer
            .process_event(br#"{"cv_id": "huge"}"#)
            .await
            .unwrap_err();
        assert!(err.is_resource_exhausted());
        assert_eq!(err.disposition(), Disposition::Discard);
    }

    #[tokio::test]
    async fn test_empty_resume_acks_without_upsert() {
        let mut documents = MockCvStore::new();
        documents.expect_get_cv().returning(|cv_id| {
            Ok(serde_json::from_value(serde_json::json!({"cv_id": cv_id})).unwrap())
        });

        // No embed/upsert expectations: the pipeline must stop early.
        let indexer = indexer(documents, MockEmbedder::new(), MockVectorIndex::new());
        indexer
            .process_event(br#"{"cv_id": "empty"}"#)
            .await
            .unwrap();
    }
}
