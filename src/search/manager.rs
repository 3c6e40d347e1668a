//! Backend selection
//!
//! Picks the transport named by the configuration. The selected backend is
//! wrapped by a [`SearchClient`](super::SearchClient) and shared by both
//! scopes of a session.

use anyhow::{Context, Result};
use tracing::info;

use super::algolia::AlgoliaTransport;
use super::memory::MemoryTransport;
use super::{SearchError, SearchRequest, SearchResponse, SearchTransport};
use crate::config::{Config, ConfigError, SearchBackendType};

/// The configured search transport
pub enum Backend {
    Algolia(AlgoliaTransport),
    Memory(MemoryTransport),
}

impl Backend {
    /// Create the backend named by the configuration
    ///
    /// Missing credentials or index settings fail here, before a session
    /// is created.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate_backend()?;

        let backend = match config.backend.kind {
            SearchBackendType::Algolia => {
                let transport = AlgoliaTransport::from_config(&config.backend)
                    .context("Failed to create Algolia client")?;
                info!(
                    "Using Algolia index '{}' at {}",
                    config.backend.index_name,
                    transport.base_url()
                );
                Backend::Algolia(transport)
            }
            SearchBackendType::Memory => {
                let path = config
                    .backend
                    .records
                    .as_deref()
                    .ok_or(ConfigError::MissingRecords)?;
                let transport = MemoryTransport::from_file(path)?;
                info!(
                    "Using in-memory index with {} records from {:?}",
                    transport.records().len(),
                    path
                );
                Backend::Memory(transport)
            }
        };

        Ok(backend)
    }
}

impl SearchTransport for Backend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        match self {
            Backend::Algolia(transport) => transport.search(request).await,
            Backend::Memory(transport) => transport.search(request).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Backend::Algolia(transport) => transport.name(),
            Backend::Memory(transport) => transport.name(),
        }
    }
}
