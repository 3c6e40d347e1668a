//! Search session controller
//!
//! Owns the query string shared by both scopes, the active tab, and the
//! dialog visibility. Visibility follows the navigation marker: opening
//! pushes a marker entry, closing navigates back, and the host reports marker
//! changes through [`SearchSession::on_navigation_marker_change`].
//!
//! The scope executors are created the first time the dialog is shown. Once
//! [`SearchSession::open_dialog`] has been called they stay alive while the
//! dialog is hidden, so reopening shows the previous results without
//! refetching.

pub mod executor;
pub mod navigation;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ConfigError;
use crate::links::{self, LinkTarget};
use crate::search::{Hit, ScopeFilter, ScopeKind, SearchClient, SearchTransport};

pub use executor::{ExecutorSettings, HitPage, ScopeExecutor, ScopeSnapshot, ScopeStatus};
pub use navigation::{MemoryHistory, Navigator};

/// The library the session is scoped to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Library {
    pub key: String,
    pub name: String,
}

/// Validated settings for a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub index_name: String,
    pub library: Library,
    pub url_prefix: String,
    pub hits_per_page: u32,
    /// Navigation marker fragment, without the leading `#`
    pub marker: String,
    pub stalled_delay: Duration,
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::MissingIndexName);
        }
        if self.library.key.trim().is_empty() {
            return Err(ConfigError::MissingLibraryKey);
        }
        if self.hits_per_page == 0 {
            return Err(ConfigError::ZeroHitsPerPage);
        }
        if self.marker.trim_start_matches('#').trim().is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        Ok(())
    }

    fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            index_name: self.index_name.clone(),
            hits_per_page: self.hits_per_page,
            stalled_delay: self.stalled_delay,
        }
    }
}

/// Read-only view of the session for the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub query: String,
    pub active_scope: ScopeKind,
    pub dialog_open: bool,
    pub mounted: bool,
}

struct Scopes<T: SearchTransport> {
    current: ScopeExecutor<T>,
    others: ScopeExecutor<T>,
}

impl<T: SearchTransport> Scopes<T> {
    fn get(&self, kind: ScopeKind) -> &ScopeExecutor<T> {
        match kind {
            ScopeKind::CurrentLibrary => &self.current,
            ScopeKind::OtherLibraries => &self.others,
        }
    }
}

/// Search session controller
pub struct SearchSession<T: SearchTransport, N: Navigator> {
    config: SessionConfig,
    marker: String,
    client: Arc<SearchClient<T>>,
    navigator: N,
    query: String,
    active_scope: ScopeKind,
    dialog_open: bool,
    keep_mounted: bool,
    focus_requested: bool,
    scopes: Option<Scopes<T>>,
}

impl<T: SearchTransport, N: Navigator> SearchSession<T, N> {
    /// Create a session and sync it with the current navigation state
    ///
    /// A marker already present (deep link) opens the dialog right away.
    /// Must be called within a tokio runtime since that may start fetches.
    pub fn new(
        config: SessionConfig,
        client: Arc<SearchClient<T>>,
        navigator: N,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let marker = config.marker.trim_start_matches('#').to_string();

        let mut session = Self {
            config,
            marker,
            client,
            navigator,
            query: String::new(),
            active_scope: ScopeKind::CurrentLibrary,
            dialog_open: false,
            keep_mounted: false,
            focus_requested: false,
            scopes: None,
        };
        session.sync_with_navigator();
        Ok(session)
    }

    pub fn library(&self) -> &Library {
        &self.config.library
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Direct access to the navigator, for hosts that drive history themselves
    pub fn navigator_mut(&mut self) -> &mut N {
        &mut self.navigator
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn active_scope(&self) -> ScopeKind {
        self.active_scope
    }

    pub fn is_dialog_open(&self) -> bool {
        self.dialog_open
    }

    /// Whether the scope executors currently exist
    pub fn is_mounted(&self) -> bool {
        self.scopes.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            query: self.query.clone(),
            active_scope: self.active_scope,
            dialog_open: self.dialog_open,
            mounted: self.is_mounted(),
        }
    }

    pub fn scope(&self, kind: ScopeKind) -> Option<&ScopeExecutor<T>> {
        self.scopes.as_ref().map(|scopes| scopes.get(kind))
    }

    pub fn scope_snapshot(&self, kind: ScopeKind) -> Option<ScopeSnapshot> {
        self.scope(kind).map(ScopeExecutor::snapshot)
    }

    /// Update the shared query; every mounted scope restarts from page 0
    pub fn set_query_string(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query == self.query {
            debug!("Query unchanged ({:?}), nothing to refetch", query);
            return;
        }
        self.query = query;

        if let Some(scopes) = &self.scopes {
            scopes.current.set_query(&self.query);
            scopes.others.set_query(&self.query);
        }
    }

    /// Switch the visible tab; both scopes keep their own fetches running
    pub fn set_active_scope(&mut self, scope: ScopeKind) {
        self.active_scope = scope;
    }

    /// Request the next page for a scope; false when nothing was issued
    pub fn load_more(&self, scope: ScopeKind) -> bool {
        self.scope(scope).is_some_and(ScopeExecutor::load_more)
    }

    /// Show the dialog by pushing a marker entry onto the history
    ///
    /// Visibility is set optimistically; the marker change event that
    /// follows confirms it.
    pub fn open_dialog(&mut self) {
        if !self.navigator.marker_present(&self.marker) {
            self.navigator.push_marker(&self.marker);
        }
        self.keep_mounted = true;
        self.focus_requested = true;
        if !self.dialog_open {
            info!("Opening search dialog");
            self.dialog_open = true;
        }
        self.mount();
    }

    /// Hide the dialog by navigating back past the marker entry
    ///
    /// Visibility only changes once the resulting marker change is reported.
    /// With no earlier entry to return to (deep link), the marker is removed
    /// from the current entry instead. Does nothing once the marker is gone,
    /// so repeated closes never leave the page.
    pub fn close_dialog(&mut self) {
        if !self.navigator.marker_present(&self.marker) {
            debug!("Close requested without a marker entry, ignoring");
            return;
        }
        if self.navigator.can_go_back() {
            self.navigator.back();
        } else {
            self.navigator.clear_marker(&self.marker);
        }
    }

    /// Handle a navigation marker change (load, hash change, back/forward)
    pub fn on_navigation_marker_change(&mut self, marker_present: bool) {
        if marker_present == self.dialog_open {
            return;
        }
        self.dialog_open = marker_present;

        if marker_present {
            info!("Search dialog shown by navigation");
            self.mount();
        } else {
            info!("Search dialog hidden by navigation");
            self.focus_requested = false;
            if !self.keep_mounted {
                self.unmount();
            }
        }
    }

    /// Poll the navigator and apply its marker state
    pub fn sync_with_navigator(&mut self) {
        let present = self.navigator.marker_present(&self.marker);
        self.on_navigation_marker_change(present);
    }

    /// Consume the pending focus transfer to the query input
    ///
    /// Called by the renderer once the input is mounted and visible.
    pub fn take_focus_request(&mut self) -> bool {
        let requested = self.focus_requested && self.dialog_open && self.is_mounted();
        self.focus_requested = false;
        requested
    }

    /// Link targets for a hit's breadcrumb trail
    pub fn link_targets(&self, hit: &Hit) -> Vec<LinkTarget> {
        links::link_targets(&self.config.url_prefix, hit)
    }

    /// Wait until neither scope has a fetch outstanding
    pub async fn settled(&self) {
        if let Some(scopes) = &self.scopes {
            tokio::join!(scopes.current.settled(), scopes.others.settled());
        }
    }

    fn mount(&mut self) {
        if self.scopes.is_some() {
            return;
        }

        let settings = self.config.executor_settings();
        let key = &self.config.library.key;
        let scopes = Scopes {
            current: ScopeExecutor::new(
                Arc::clone(&self.client),
                ScopeFilter::new(ScopeKind::CurrentLibrary, key.clone()),
                settings.clone(),
            ),
            others: ScopeExecutor::new(
                Arc::clone(&self.client),
                ScopeFilter::new(ScopeKind::OtherLibraries, key.clone()),
                settings,
            ),
        };
        scopes.current.set_query(&self.query);
        scopes.others.set_query(&self.query);

        debug!("Mounted search scopes for library '{}'", key);
        self.scopes = Some(scopes);
    }

    fn unmount(&mut self) {
        if self.scopes.take().is_some() {
            debug!("Unmounted search scopes");
        }
    }
}

/// Abbreviated hit count for tab labels (`1.2k` above 999)
pub fn format_count(count: u64) -> String {
    if count > 999 {
        // Tenths of a thousand, rounded half up
        let tenths = count.saturating_add(50) / 100;
        format!("{}.{}k", tenths / 10, tenths % 10)
    } else {
        count.to_string()
    }
}
