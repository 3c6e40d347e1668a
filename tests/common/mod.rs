//! Shared fixtures for integration tests
//!
//! [`ScriptedTransport`] holds every request until the test answers it, so
//! tests decide the order in which responses arrive.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use gecko_search::search::{
    HierarchyLevel, Hit, SearchError, SearchRequest, SearchResponse, SearchTransport,
};
use gecko_search::session::{Library, MemoryHistory, SessionConfig};

pub const PAGE_URL: &str = "https://www.boost.org/doc/libs/core/index.html";
pub const MARKER: &str = "search-dialog";

/// A request waiting for its scripted answer
pub struct Pending {
    pub request: SearchRequest,
    reply: oneshot::Sender<Result<SearchResponse, SearchError>>,
}

impl Pending {
    pub fn respond(self, result: Result<SearchResponse, SearchError>) {
        // The fetch may have been aborted already
        let _ = self.reply.send(result);
    }

    /// Answer with a page of a result set of `total` hits
    pub fn respond_total(self, total: u64) {
        let response = page_of(&self.request, total);
        self.respond(Ok(response));
    }

    pub fn fail(self, error: SearchError) {
        self.respond(Err(error));
    }

    /// Whether the issuing fetch was aborted before an answer arrived
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    pub fn is_current_library(&self) -> bool {
        !self.request.filters.starts_with("NOT ")
    }
}

/// Transport whose responses are supplied by the test
#[derive(Clone)]
pub struct ScriptedTransport {
    requests: mpsc::UnboundedSender<Pending>,
    issued: Arc<AtomicUsize>,
}

/// Test side of a [`ScriptedTransport`]
pub struct Script {
    incoming: mpsc::UnboundedReceiver<Pending>,
    buffered: Vec<Pending>,
    issued: Arc<AtomicUsize>,
}

pub fn scripted() -> (ScriptedTransport, Script) {
    let (tx, rx) = mpsc::unbounded_channel();
    let issued = Arc::new(AtomicUsize::new(0));
    (
        ScriptedTransport {
            requests: tx,
            issued: Arc::clone(&issued),
        },
        Script {
            incoming: rx,
            buffered: Vec::new(),
            issued,
        },
    )
}

impl SearchTransport for ScriptedTransport {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Pending {
                request: request.clone(),
                reply,
            })
            .map_err(|_| SearchError::NotAvailable)?;
        answer.await.unwrap_or(Err(SearchError::NotAvailable))
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}

impl Script {
    /// Number of requests the transport has received so far
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Next outstanding request matching `pred`, waiting for one if needed
    pub async fn take(&mut self, pred: impl Fn(&Pending) -> bool) -> Pending {
        if let Some(pos) = self.buffered.iter().position(&pred) {
            return self.buffered.remove(pos);
        }
        loop {
            let next = tokio::time::timeout(Duration::from_secs(5), self.incoming.recv())
                .await
                .expect("timed out waiting for a request")
                .expect("transport dropped");
            if pred(&next) {
                return next;
            }
            self.buffered.push(next);
        }
    }

    pub async fn current(&mut self) -> Pending {
        self.take(Pending::is_current_library).await
    }

    /// Current-library request for a specific query and page
    pub async fn current_page(&mut self, query: &str, page: u32) -> Pending {
        self.take(|p| p.is_current_library() && p.request.query == query && p.request.page == page)
            .await
    }

    pub async fn others(&mut self) -> Pending {
        self.take(|p| !p.is_current_library()).await
    }

    /// Requests received but not yet taken
    pub fn outstanding(&mut self) -> usize {
        while let Ok(next) = self.incoming.try_recv() {
            self.buffered.push(next);
        }
        self.buffered.len()
    }
}

/// Build the page a backend would return for `request` out of `total` hits
pub fn page_of(request: &SearchRequest, total: u64) -> SearchResponse {
    let per_page = u64::from(request.hits_per_page.max(1));
    let start = u64::from(request.page) * per_page;
    let end = total.min(start + per_page);
    let nb_pages = total.div_ceil(per_page) as u32;

    let hits = (start..end)
        .map(|i| hit(&format!("{}-{}-{}", request.filters, request.query, i)))
        .collect();

    SearchResponse {
        hits,
        nb_hits: total,
        page: request.page,
        nb_pages,
    }
}

pub fn hit(id: &str) -> Hit {
    Hit {
        id: id.to_string(),
        library_key: "core".to_string(),
        library_name: "Core".to_string(),
        hierarchy: vec![HierarchyLevel {
            level: "lvl0".to_string(),
            title: id.to_string(),
            path: format!("libs/core/{}.html", id),
        }],
        content_snippet: String::new(),
        highlighted_titles: BTreeMap::new(),
    }
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        index_name: "boost".to_string(),
        library: Library {
            key: "core".to_string(),
            name: "Core".to_string(),
        },
        url_prefix: "https://www.boost.org/doc/".to_string(),
        hits_per_page: 30,
        marker: MARKER.to_string(),
        stalled_delay: Duration::from_millis(200),
    }
}

pub fn history() -> MemoryHistory {
    MemoryHistory::new(PAGE_URL)
}

/// Let spawned fetch tasks run until they block on the transport
pub async fn drain() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
