//! Navigation history collaborator
//!
//! The dialog's visibility follows a URL fragment marker. The session asks
//! the navigator to push or leave marker entries; the host reports the
//! resulting marker state back through
//! [`SearchSession::on_navigation_marker_change`](super::SearchSession::on_navigation_marker_change).

/// Browser-like history the session drives
pub trait Navigator {
    /// Whether the current entry carries the marker fragment
    fn marker_present(&self, marker: &str) -> bool;

    /// Push a new entry carrying the marker; never replaces the current one
    fn push_marker(&mut self, marker: &str);

    /// Navigate one entry back
    fn back(&mut self);

    /// Whether an earlier entry exists
    fn can_go_back(&self) -> bool {
        true
    }

    /// Replace the current entry with the same URL minus the marker
    fn clear_marker(&mut self, marker: &str);
}

/// Split a URL into its base and optional fragment
fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    }
}

/// In-memory history stack with back/forward, used by the CLI and tests
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Vec<String>,
    index: usize,
    pushes: usize,
}

impl MemoryHistory {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            entries: vec![url.into()],
            index: 0,
            pushes: 0,
        }
    }

    pub fn current(&self) -> &str {
        &self.entries[self.index]
    }

    /// Push an entry, dropping any forward entries
    pub fn push(&mut self, url: impl Into<String>) {
        self.entries.truncate(self.index + 1);
        self.entries.push(url.into());
        self.index += 1;
        self.pushes += 1;
    }

    pub fn go_back(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        true
    }

    pub fn go_forward(&mut self) -> bool {
        if self.index + 1 >= self.entries.len() {
            return false;
        }
        self.index += 1;
        true
    }

    /// Number of entries pushed since creation
    pub fn push_count(&self) -> usize {
        self.pushes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Navigator for MemoryHistory {
    fn marker_present(&self, marker: &str) -> bool {
        split_fragment(self.current()).1 == Some(marker)
    }

    fn push_marker(&mut self, marker: &str) {
        let (base, _) = split_fragment(self.current());
        let url = format!("{}#{}", base, marker);
        self.push(url);
    }

    fn back(&mut self) {
        self.go_back();
    }

    fn can_go_back(&self) -> bool {
        self.index > 0
    }

    fn clear_marker(&mut self, marker: &str) {
        let (base, fragment) = split_fragment(self.current());
        if fragment == Some(marker) {
            let base = base.to_string();
            self.entries[self.index] = base;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "search-dialog";

    #[test]
    fn push_marker_adds_an_entry() {
        let mut history = MemoryHistory::new("https://example.org/doc/libs/core/index.html");
        assert!(!history.marker_present(MARKER));

        history.push_marker(MARKER);
        assert!(history.marker_present(MARKER));
        assert_eq!(history.len(), 2);
        assert_eq!(history.push_count(), 1);
        assert_eq!(
            history.current(),
            "https://example.org/doc/libs/core/index.html#search-dialog"
        );

        history.back();
        assert!(!history.marker_present(MARKER));
        assert!(history.go_forward());
        assert!(history.marker_present(MARKER));
    }

    #[test]
    fn push_replaces_existing_fragment() {
        let mut history = MemoryHistory::new("https://example.org/page#section-2");
        history.push_marker(MARKER);
        assert_eq!(history.current(), "https://example.org/page#search-dialog");
    }

    #[test]
    fn push_truncates_forward_entries() {
        let mut history = MemoryHistory::new("/a");
        history.push("/b");
        history.push("/c");
        history.go_back();
        history.push("/d");
        assert_eq!(history.len(), 3);
        assert!(!history.go_forward());
        assert_eq!(history.current(), "/d");
    }

    #[test]
    fn clear_marker_replaces_in_place() {
        let mut history = MemoryHistory::new("/page#search-dialog");
        assert!(!history.can_go_back());
        history.clear_marker(MARKER);
        assert_eq!(history.current(), "/page");
        assert_eq!(history.len(), 1);
        assert_eq!(history.push_count(), 0);
    }
}
