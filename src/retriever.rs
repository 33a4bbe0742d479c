//! Semantic retrieval over indexed résumé chunks
//!
//! Two query modes against one job description: threshold-filtered
//! chunk retrieval with section-aware deduplication and per-résumé
//! capping, and top-k résumé ranking by aggregated chunk scores.

use crate::embedding::Embedder;
use crate::error::{Result, ServiceError};
use crate::vector_store::VectorIndex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default similarity threshold for chunk retrieval
pub const DEFAULT_MIN_SCORE: f32 = 0.75;

/// Default pool size queried from the index before filtering
pub const DEFAULT_MAX_CHUNKS_TO_QUERY: usize = 50;

/// Default cap on returned chunks
pub const DEFAULT_MAX_RETURNED_CHUNKS: usize = 20;

/// Default cap on chunks accepted per résumé
pub const DEFAULT_PER_CV_LIMIT: usize = 3;

/// Default number of résumés returned by [`Retriever::search_top_k_cvs`]
pub const DEFAULT_TOP_K: usize = 3;

/// Default chunk pool aggregated per résumé ranking
pub const DEFAULT_RAW_TOP_K: usize = 30;

/// Near-duplicate summaries collapse only when their scores agree to
/// this many decimal places
const SUMMARY_SCORE_DECIMALS: i32 = 3;

/// Tunables for [`Retriever::find_similar_chunks`]
#[derive(Debug, Clone)]
pub struct ChunkQuery {
    /// Matches below this cosine score are dropped
    pub min_score: f32,
    /// How many matches to pull from the index before filtering
    pub max_chunks_to_query: usize,
    /// Hard cap on accepted chunks
    pub max_returned_chunks: usize,
    /// Max accepted chunks per résumé
    pub per_cv_limit: usize,
}

impl Default for ChunkQuery {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            max_chunks_to_query: DEFAULT_MAX_CHUNKS_TO_QUERY,
            max_returned_chunks: DEFAULT_MAX_RETURNED_CHUNKS,
            per_cv_limit: DEFAULT_PER_CV_LIMIT,
        }
    }
}

/// One relevant chunk returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHit {
    pub text: String,
    pub section: String,
    pub cv_id: String,
    pub score: f32,
}

/// One ranked résumé
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvHit {
    pub cv_id: String,
    pub score: f32,
}

/// Retrieval front-end over the shared embedder and vector index
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Return chunks relevant to a job description, best first.
    ///
    /// Matches stream through four filters in order: score threshold,
    /// blank text, per-résumé cap, duplicate collapse. Bullet chunks
    /// are returned ahead of summaries since they carry the
    /// discriminative content; within each group the score order from
    /// the index is preserved.
    pub async fn find_similar_chunks(
        &self,
        jd_text: &str,
        query: &ChunkQuery,
    ) -> Result<Vec<ChunkHit>> {
        if jd_text.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "job description text cannot be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&query.min_score) {
            return Err(ServiceError::InvalidInput(
                "min_score must be between 0.0 and 1.0".to_string(),
            ));
        }

        debug!(chars = jd_text.len(), "Embedding job description");
        let jd_vector = self.embedder.embed(jd_text).await?;

        let matches = self
            .index
            .query(&jd_vector, query.max_chunks_to_query)
            .await?;

        let mut accepted: Vec<ChunkHit> = Vec::new();
        let mut per_cv_counts: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();

        for m in &matches {
            if m.score < query.min_score {
                continue;
            }

            let text = m.metadata_str("text").trim();
            if text.is_empty() {
                continue;
            }

            let cv_id = m.metadata_str("cv_id").to_string();
            let section = m.metadata_str("section").to_string();

            if per_cv_counts.get(&cv_id).copied().unwrap_or(0) >= query.per_cv_limit {
                continue;
            }

            if !seen.insert(dedup_key(&section, text, m.score)) {
                continue;
            }

            accepted.push(ChunkHit {
                text: text.to_string(),
                section,
                cv_id: cv_id.clone(),
                score: m.score,
            });
            *per_cv_counts.entry(cv_id).or_insert(0) += 1;

            if accepted.len() >= query.max_returned_chunks {
                break;
            }
        }

        info!(
            accepted = accepted.len(),
            queried = matches.len(),
            min_score = query.min_score,
            "Chunk retrieval complete"
        );
        if accepted.is_empty() {
            warn!(
                min_score = query.min_score,
                "No chunks above threshold; consider lowering it"
            );
        }

        let (bullets, summaries): (Vec<ChunkHit>, Vec<ChunkHit>) = accepted
            .into_iter()
            .partition(|hit| hit.section != "summary");

        let mut ordered = bullets;
        ordered.extend(summaries);
        Ok(ordered)
    }

    /// Rank résumés for a job description by summed chunk scores.
    ///
    /// Summing rather than averaging rewards résumés with several
    /// relevant passages; the bounded query pool keeps that advantage
    /// confined to the top matches.
    pub async fn search_top_k_cvs(
        &self,
        jd_text: &str,
        top_k: usize,
        raw_top_k: usize,
    ) -> Result<Vec<CvHit>> {
        if jd_text.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "job description text cannot be empty".to_string(),
            ));
        }

        debug!(chars = jd_text.len(), "Embedding job description");
        let jd_vector = self.embedder.embed(jd_text).await?;

        let matches = self.index.query(&jd_vector, raw_top_k).await?;

        let mut scores_by_cv: HashMap<String, f32> = HashMap::new();
        for m in &matches {
            let cv_id = m.metadata_str("cv_id");
            if cv_id.is_empty() {
                continue;
            }
            *scores_by_cv.entry(cv_id.to_string()).or_insert(0.0) += m.score;
        }

        let mut ranked: Vec<CvHit> = scores_by_cv
            .into_iter()
            .map(|(cv_id, score)| CvHit { cv_id, score })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.cv_id.cmp(&b.cv_id))
        });
        ranked.truncate(top_k);

        info!(results = ranked.len(), "Résumé ranking complete");
        Ok(ranked)
    }
}

/// Duplicate-collapse key. Bullet-bearing sections collapse on their
/// text alone; summaries are near-duplicates across candidates, so
/// identical prose is collapsed only at equal (rounded) score.
fn dedup_key(section: &str, text: &str, score: f32) -> (String, String) {
    let normalized = text.to_lowercase();
    if section == "summary" {
        let factor = 10f32.powi(SUMMARY_SCORE_DECIMALS);
        let rounded = (score * factor).round() / factor;
        (format!("summary:{rounded:.3}"), normalized)
    } else {
        (section.to_string(), normalized)
    }
}
