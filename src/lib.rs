//! Semantic résumé indexing and retrieval
//!
//! The vector half of a résumé ⇄ job-description matching platform:
//!
//! - consumes `cv.created` events from a durable stream and turns each
//!   stored résumé into semantically-typed chunks,
//! - embeds chunks in batch and upserts them into an external vector
//!   index under deterministic ids, so redelivered events overwrite
//!   instead of duplicating,
//! - answers retrieval queries for any job description: relevant
//!   chunks above a similarity threshold (deduplicated and capped per
//!   résumé) and top-k résumés ranked by aggregated chunk scores,
//! - exposes both queries to the upstream gateway over a thin internal
//!   HTTP surface.
//!
//! # Example
//!
//! ```rust,no_run
//! use cvmatch::config::AppConfig;
//! use cvmatch::embedding::HttpEmbedder;
//! use cvmatch::retriever::{ChunkQuery, Retriever};
//! use cvmatch::vector_store::PineconeIndex;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let embedder = Arc::new(HttpEmbedder::new(config.embedding.clone()));
//!     let index = Arc::new(PineconeIndex::connect(config.vector_store.clone()).await?);
//!
//!     let retriever = Retriever::new(embedder, index);
//!     let hits = retriever
//!         .find_similar_chunks("Senior Rust engineer", &ChunkQuery::default())
//!         .await?;
//!
//!     for hit in hits {
//!         println!("[{}] {:.2} {}", hit.section, hit.score, hit.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chunker;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod resume;
pub mod retriever;
pub mod vector_store;

// Re-export main types
pub use api::{create_router, start_server, AppState};
pub use chunker::{chunk_resume, Chunk};
pub use config::AppConfig;
pub use documents::{CvStore, DocumentClient};
pub use embedding::{Embedder, HttpEmbedder, EMBEDDING_DIM};
pub use error::{Disposition, ErrorKind, Result, ServiceError};
pub use indexer::{run_consumer, IndexEvent, Indexer};
pub use resume::{CvDocument, StructuredResume};
pub use retriever::{ChunkHit, ChunkQuery, CvHit, Retriever};
pub use vector_store::{
    record_id, records_from_chunks, PineconeIndex, QueryMatch, VectorIndex, VectorRecord,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
