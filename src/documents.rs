//! Structured-document store client
//!
//! Remote read of stored résumés by content id. A 404 is terminal
//! (the résumé will never appear for this id); connection failures
//! and 5xx responses are transient and safe to retry.

use crate::config::DocumentStoreConfig;
use crate::error::{DocumentError, Result};
use crate::resume::CvDocument;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Trait for résumé lookup by content id
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CvStore: Send + Sync {
    async fn get_cv(&self, cv_id: &str) -> Result<CvDocument>;
}

/// HTTP client for the document store's internal API
pub struct DocumentClient {
    client: reqwest::Client,
    base_url: String,
}

impl DocumentClient {
    /// Create a new document store client
    pub fn new(config: &DocumentStoreConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CvStore for DocumentClient {
    async fn get_cv(&self, cv_id: &str) -> Result<CvDocument> {
        let url = format!("{}/internal/get_cv/{cv_id}", self.base_url);
        debug!(cv_id, "Fetching structured résumé");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DocumentError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(DocumentError::NotFound(cv_id.to_string()).into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentError::UpstreamStatus {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let document: CvDocument = response
            .json()
            .await
            .map_err(|e| DocumentError::InvalidPayload(e.to_string()))?;
        Ok(document)
    }
}
