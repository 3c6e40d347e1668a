//! Search transport abstraction layer
//!
//! Provides a unified interface for the search backends:
//! - Algolia (hosted index, primary)
//! - Memory (records file, offline runs and tests)
//!
//! Both scope executors of a session share one [`SearchClient`], which wraps
//! the transport and dispatches transport failures to scoped listeners.

pub mod algolia;
pub mod client;
pub mod filter;
pub mod manager;
pub mod memory;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

pub use gecko_search_core::{HierarchyLevel, Hit, ScopeKind, SearchRequest, SearchResponse};

// Re-export main types
pub use client::{ErrorSubscription, RequestOrigin, SearchClient, TransportFailure};
pub use filter::{FilterExpr, ScopeFilter};
pub use manager::Backend;

/// Transport errors, surfaced per scope and never fatal to the session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search backend is not available")]
    NotAvailable,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Invalid filter expression: {0}")]
    InvalidFilter(String),
}

impl SearchError {
    /// Stable error name shown as the notice title
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::NotAvailable => "UnavailableError",
            SearchError::Network(_) => "NetworkError",
            SearchError::Status { .. } => "ApiError",
            SearchError::Decode(_) => "DecodeError",
            SearchError::InvalidFilter(_) => "FilterError",
        }
    }

    /// Human readable detail without the kind prefix
    pub fn message(&self) -> String {
        match self {
            SearchError::NotAvailable => "Search backend is not available".to_string(),
            SearchError::Network(msg)
            | SearchError::Decode(msg)
            | SearchError::InvalidFilter(msg) => msg.clone(),
            SearchError::Status { message, .. } => message.clone(),
        }
    }

    pub fn notice(&self) -> ErrorNotice {
        ErrorNotice {
            kind: self.kind().to_string(),
            message: self.message(),
        }
    }
}

/// Error as handed to the renderer: a title and a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    pub kind: String,
    pub message: String,
}

impl std::fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Trait for search transports
///
/// Transports must be Send + Sync since one instance is shared by both
/// scope executors and fetches run on spawned tasks.
pub trait SearchTransport: Send + Sync + 'static {
    /// Fetch one page of results
    fn search(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<SearchResponse, SearchError>> + Send;

    /// Get the name of this transport for logging/status
    fn name(&self) -> &'static str;
}
