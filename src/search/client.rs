//! Shared search client
//!
//! One client is constructed per session and handed to both scope executors.
//! Failed fetches are published to the error listeners registered on the
//! client; each listener is owned by an [`ErrorSubscription`] and removed
//! when that subscription is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use super::{ScopeKind, SearchError, SearchRequest, SearchResponse, SearchTransport};

/// Identifies who issued a request and for which query generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOrigin {
    /// Unique id of the issuing executor
    pub executor: u64,
    pub scope: ScopeKind,
    /// Query generation the request belongs to
    pub generation: u64,
}

/// A failed fetch as seen by error listeners
#[derive(Debug, Clone)]
pub struct TransportFailure {
    pub origin: RequestOrigin,
    pub query: String,
    pub page: u32,
    pub error: SearchError,
}

type ErrorListener = Arc<dyn Fn(&TransportFailure) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(u64, ErrorListener)>,
}

/// Recover the guard from a poisoned lock; guarded state is plain data
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport plus the error listener hub
pub struct SearchClient<T> {
    transport: T,
    listeners: Arc<Mutex<ListenerTable>>,
}

impl<T: SearchTransport> SearchClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            listeners: Arc::new(Mutex::new(ListenerTable::default())),
        }
    }

    /// Run a request, publishing failures to the registered listeners
    pub async fn search(
        &self,
        request: &SearchRequest,
        origin: RequestOrigin,
    ) -> Result<SearchResponse, SearchError> {
        debug!(
            "[{}] fetching page {} for {:?} ({})",
            origin.scope, request.page, request.query, request.filters
        );

        let result = self.transport.search(request).await;

        if let Err(error) = &result {
            warn!(
                "[{}] {} search failed on page {}: {}",
                origin.scope,
                self.transport.name(),
                request.page,
                error
            );
            self.publish(&TransportFailure {
                origin,
                query: request.query.clone(),
                page: request.page,
                error: error.clone(),
            });
        }

        result
    }

    /// Register an error listener for the lifetime of the returned subscription
    #[must_use = "the listener is removed as soon as the subscription is dropped"]
    pub fn add_error_listener<F>(&self, listener: F) -> ErrorSubscription
    where
        F: Fn(&TransportFailure) + Send + Sync + 'static,
    {
        let mut table = lock(&self.listeners);
        let id = table.next_id;
        table.next_id += 1;
        table.entries.push((id, Arc::new(listener)));

        ErrorSubscription {
            id,
            table: Arc::downgrade(&self.listeners),
        }
    }

    /// Get the number of registered error listeners
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    fn publish(&self, failure: &TransportFailure) {
        // Listeners run outside the lock so they may touch the table themselves
        let listeners: Vec<ErrorListener> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(failure);
        }
    }
}

/// Keeps an error listener registered; dropping it unsubscribes
pub struct ErrorSubscription {
    id: u64,
    table: Weak<Mutex<ListenerTable>>,
}

impl std::fmt::Debug for ErrorSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorSubscription").field("id", &self.id).finish()
    }
}

impl Drop for ErrorSubscription {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            lock(&table).entries.retain(|(id, _)| *id != self.id);
        }
    }
}
