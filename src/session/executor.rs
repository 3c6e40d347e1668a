//! Scope query executor
//!
//! Runs the session query against one scope of the index and accumulates
//! pages of hits. Every query change starts a new generation: accumulated
//! hits are cleared, page 0 is fetched, and any response still in flight for
//! an earlier generation is discarded when it arrives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::search::client::lock;
use crate::search::{
    ErrorNotice, ErrorSubscription, Hit, RequestOrigin, ScopeFilter, ScopeKind, SearchClient,
    SearchError, SearchRequest, SearchResponse, SearchTransport,
};

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Fetch settings shared by both scopes of a session
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub index_name: String,
    pub hits_per_page: u32,
    /// A fetch pending longer than this reports as stalled
    pub stalled_delay: Duration,
}

/// Fetch status of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeStatus {
    Idle,
    Loading,
    Stalled,
    Error,
    Done,
}

impl ScopeStatus {
    /// Loading and stalled both mean a fetch is outstanding
    pub fn is_busy(self) -> bool {
        matches!(self, ScopeStatus::Loading | ScopeStatus::Stalled)
    }
}

impl std::fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ScopeStatus::Idle => "idle",
            ScopeStatus::Loading => "loading",
            ScopeStatus::Stalled => "stalled",
            ScopeStatus::Error => "error",
            ScopeStatus::Done => "done",
        };
        f.write_str(name)
    }
}

/// Accumulated hits of a scope
///
/// Cheap to clone; each call to [`ScopeExecutor::current_page`] returns a
/// fresh view of the latest state.
#[derive(Debug, Clone, Default)]
pub struct HitPage {
    hits: Vec<Arc<Hit>>,
}

impl HitPage {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Hit> {
        self.hits.get(index).map(|hit| &**hit)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter().map(|hit| &**hit)
    }

    pub fn ids(&self) -> Vec<String> {
        self.iter().map(|hit| hit.id.clone()).collect()
    }
}

impl From<Vec<Hit>> for HitPage {
    fn from(hits: Vec<Hit>) -> Self {
        Self {
            hits: hits.into_iter().map(Arc::new).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a HitPage {
    type Item = &'a Hit;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, Arc<Hit>>, fn(&'a Arc<Hit>) -> &'a Hit>;

    fn into_iter(self) -> Self::IntoIter {
        let deref: fn(&'a Arc<Hit>) -> &'a Hit = |hit| &**hit;
        self.hits.iter().map(deref)
    }
}

/// Read-only view of a scope for the renderer
#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    pub scope: ScopeKind,
    pub query: String,
    pub hits: HitPage,
    pub total_hits: u64,
    pub is_last_page: bool,
    pub status: ScopeStatus,
    pub error: Option<ErrorNotice>,
    pub page_index: u32,
}

#[derive(Debug)]
struct ScopeState {
    query: String,
    generation: u64,
    /// Page most recently requested
    page_index: u32,
    /// Pages appended for the current generation
    pages_loaded: u32,
    hits: Vec<Arc<Hit>>,
    is_last_page: bool,
    status: ScopeStatus,
    total_hits: u64,
    error: Option<SearchError>,
}

impl ScopeState {
    fn new() -> Self {
        Self {
            query: String::new(),
            generation: 0,
            page_index: 0,
            pages_loaded: 0,
            hits: Vec::new(),
            is_last_page: false,
            status: ScopeStatus::Idle,
            total_hits: 0,
            error: None,
        }
    }
}

/// State plus change notification, shared with fetch tasks and the error listener
struct Shared {
    scope: ScopeKind,
    state: Mutex<ScopeState>,
    changes: watch::Sender<u64>,
}

impl Shared {
    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn mark_stalled(&self, generation: u64) {
        let changed = {
            let mut state = lock(&self.state);
            if state.generation == generation && state.status == ScopeStatus::Loading {
                state.status = ScopeStatus::Stalled;
                true
            } else {
                false
            }
        };
        if changed {
            debug!("[{}] fetch stalled for {:?}", self.scope, lock(&self.state).query);
            self.notify();
        }
    }

    fn complete(&self, generation: u64, query: &str, response: SearchResponse) {
        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                debug!(
                    "[{}] discarding stale page {} for {:?} (current query {:?})",
                    self.scope, response.page, query, state.query
                );
                return;
            }

            state.is_last_page = response.is_last_page();
            state.total_hits = response.nb_hits;
            state.page_index = response.page;
            state.pages_loaded = response.page.saturating_add(1);
            state.hits.extend(response.hits.into_iter().map(Arc::new));
            state.status = ScopeStatus::Done;
            state.error = None;

            debug!(
                "[{}] page {} for {:?}: {} hits accumulated of {}",
                self.scope,
                state.page_index,
                state.query,
                state.hits.len(),
                state.total_hits
            );
        }
        self.notify();
    }

    fn fail(&self, generation: u64, query: &str, error: &SearchError) {
        {
            let mut state = lock(&self.state);
            if state.generation != generation {
                debug!(
                    "[{}] discarding stale failure for {:?}: {}",
                    self.scope, query, error
                );
                return;
            }
            state.status = ScopeStatus::Error;
            state.error = Some(error.clone());
        }
        self.notify();
    }
}

/// Paginated query runner for one scope
pub struct ScopeExecutor<T: SearchTransport> {
    id: u64,
    filter: ScopeFilter,
    settings: ExecutorSettings,
    client: Arc<SearchClient<T>>,
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    _errors: ErrorSubscription,
}

impl<T: SearchTransport> ScopeExecutor<T> {
    /// Create an idle executor and attach its error listener to the client
    pub fn new(client: Arc<SearchClient<T>>, filter: ScopeFilter, settings: ExecutorSettings) -> Self {
        let id = NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed);
        let (changes, _) = watch::channel(0);
        let shared = Arc::new(Shared {
            scope: filter.kind(),
            state: Mutex::new(ScopeState::new()),
            changes,
        });

        let listener = Arc::clone(&shared);
        let errors = client.add_error_listener(move |failure| {
            if failure.origin.executor == id {
                listener.fail(failure.origin.generation, &failure.query, &failure.error);
            }
        });

        Self {
            id,
            filter,
            settings,
            client,
            shared,
            tasks: Mutex::new(Vec::new()),
            _errors: errors,
        }
    }

    pub fn scope(&self) -> ScopeKind {
        self.filter.kind()
    }

    /// Start a new generation for `query` and fetch its first page
    pub fn set_query(&self, query: &str) {
        let request = {
            let mut state = lock(&self.shared.state);
            state.generation += 1;
            state.query = query.to_string();
            state.hits.clear();
            state.page_index = 0;
            state.pages_loaded = 0;
            state.is_last_page = false;
            state.error = None;
            self.begin_fetch(&mut state, 0)
        };
        self.shared.notify();
        self.spawn_fetch(request);
    }

    /// Fetch the next page; returns false when nothing was issued
    ///
    /// No-op on the last page or while a fetch is outstanding.
    pub fn load_more(&self) -> bool {
        let request = {
            let mut state = lock(&self.shared.state);
            if state.is_last_page || state.status.is_busy() {
                return false;
            }
            let page = state.pages_loaded;
            self.begin_fetch(&mut state, page)
        };
        self.shared.notify();
        self.spawn_fetch(request);
        true
    }

    fn begin_fetch(&self, state: &mut ScopeState, page: u32) -> PendingFetch {
        state.page_index = page;
        state.status = ScopeStatus::Loading;
        PendingFetch {
            generation: state.generation,
            request: SearchRequest {
                index_name: self.settings.index_name.clone(),
                query: state.query.clone(),
                filters: self.filter.expression(),
                hits_per_page: self.settings.hits_per_page,
                page,
            },
        }
    }

    fn spawn_fetch(&self, pending: PendingFetch) {
        let client = Arc::clone(&self.client);
        let shared = Arc::clone(&self.shared);
        let stalled_delay = self.settings.stalled_delay;
        let origin = RequestOrigin {
            executor: self.id,
            scope: self.filter.kind(),
            generation: pending.generation,
        };

        let handle = tokio::spawn(async move {
            let PendingFetch { generation, request } = pending;
            let fetch = client.search(&request, origin);
            tokio::pin!(fetch);

            let result = match tokio::time::timeout(stalled_delay, &mut fetch).await {
                Ok(result) => result,
                Err(_) => {
                    shared.mark_stalled(generation);
                    fetch.await
                }
            };

            // Failures reach the state through the error listener
            if let Ok(response) = result {
                shared.complete(generation, &request.query, response);
            }
        });

        let mut tasks = lock(&self.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Latest accumulated hits
    pub fn current_page(&self) -> HitPage {
        HitPage {
            hits: lock(&self.shared.state).hits.clone(),
        }
    }

    pub fn snapshot(&self) -> ScopeSnapshot {
        let state = lock(&self.shared.state);
        ScopeSnapshot {
            scope: self.filter.kind(),
            query: state.query.clone(),
            hits: HitPage {
                hits: state.hits.clone(),
            },
            total_hits: state.total_hits,
            is_last_page: state.is_last_page,
            status: state.status,
            error: state.error.as_ref().map(SearchError::notice),
            page_index: state.page_index,
        }
    }

    pub fn status(&self) -> ScopeStatus {
        lock(&self.shared.state).status
    }

    pub fn total_hits(&self) -> u64 {
        lock(&self.shared.state).total_hits
    }

    pub fn is_last_page(&self) -> bool {
        lock(&self.shared.state).is_last_page
    }

    pub fn page_index(&self) -> u32 {
        lock(&self.shared.state).page_index
    }

    pub fn query(&self) -> String {
        lock(&self.shared.state).query.clone()
    }

    /// Receiver bumped on every state change
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    /// Wait until no fetch is outstanding for the current query
    pub async fn settled(&self) {
        let mut changes = self.changes();
        while self.status().is_busy() {
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

impl<T: SearchTransport> Drop for ScopeExecutor<T> {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        debug!("[{}] executor {} torn down", self.filter.kind(), self.id);
    }
}

struct PendingFetch {
    generation: u64,
    request: SearchRequest,
}
