//! Configuration management for the matching service

use serde::{Deserialize, Serialize};

/// Main configuration for the matching service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Durable event-queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// External vector index settings
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Structured-document store settings
    #[serde(default)]
    pub documents: DocumentStoreConfig,

    /// Embedding backend settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Event-queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Broker URL
    #[serde(default = "default_queue_url")]
    pub url: String,

    /// Stream holding résumé lifecycle events
    #[serde(default = "default_stream")]
    pub stream: String,

    /// Subject published on new résumés
    #[serde(default = "default_subject")]
    pub subject: String,

    /// Durable consumer name; instances sharing it pull disjoint messages
    #[serde(default = "default_durable_name")]
    pub durable_name: String,

    /// Seconds to wait before reconnecting after a broker failure
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// API key for the managed vector store
    #[serde(default)]
    pub api_key: String,

    /// Index name
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Serverless cloud provider
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Serverless region
    #[serde(default = "default_region")]
    pub region: String,

    /// Namespace for all records
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Control-plane base URL
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

/// Structured-document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    /// Base URL of the document store's internal API
    #[serde(default = "default_documents_url")]
    pub base_url: String,

    /// Fetch timeout in seconds
    #[serde(default = "default_documents_timeout")]
    pub timeout_secs: u64,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding server URL
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model identifier; its output dimension must match the index
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8002
}

fn default_queue_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_stream() -> String {
    "CV_EVENTS".to_string()
}

fn default_subject() -> String {
    "cv.created".to_string()
}

fn default_durable_name() -> String {
    "cv-indexer".to_string()
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_index_name() -> String {
    "cv-chunks".to_string()
}

fn default_cloud() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

fn default_documents_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_documents_timeout() -> u64 {
    15
}

fn default_embedding_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: default_queue_url(),
            stream: default_stream(),
            subject: default_subject(),
            durable_name: default_durable_name(),
            reconnect_delay_secs: default_reconnect_delay(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_name: default_index_name(),
            cloud: default_cloud(),
            region: default_region(),
            namespace: default_namespace(),
            control_plane_url: default_control_plane_url(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_documents_url(),
            timeout_secs: default_documents_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&content)?,
            _ => return Err(anyhow::anyhow!("Unsupported config file format")),
        };
        Ok(config)
    }

    /// Load configuration from an optional file with environment
    /// overrides layered on top (`CVMATCH__QUEUE__URL` style)
    pub fn load(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("CVMATCH").separator("__"))
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.embedding.url.starts_with("http") {
            return Err(anyhow::anyhow!(
                "Invalid embedding URL: {}",
                self.embedding.url
            ));
        }

        if self.embedding.model.is_empty() {
            return Err(anyhow::anyhow!("Embedding model name cannot be empty"));
        }

        if !self.documents.base_url.starts_with("http") {
            return Err(anyhow::anyhow!(
                "Invalid document store URL: {}",
                self.documents.base_url
            ));
        }

        if self.vector_store.index_name.is_empty() {
            return Err(anyhow::anyhow!("Vector index name cannot be empty"));
        }

        if self.queue.stream.is_empty() || self.queue.subject.is_empty() {
            return Err(anyhow::anyhow!("Queue stream and subject cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.subject, "cv.created");
        assert_eq!(config.documents.timeout_secs, 15);
        assert_eq!(config.queue.reconnect_delay_secs, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        config.embedding.url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.vector_store.index_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [queue]
            url = "nats://broker:4222"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.queue.url, "nats://broker:4222");
        assert_eq!(parsed.queue.stream, "CV_EVENTS");
        assert_eq!(parsed.server.port, 8002);
    }
}
