//! Shared types for gecko-search
//!
//! This crate contains the types exchanged between the search transports
//! (hosted index, in-memory index) and the session controller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One breadcrumb level of a hit, ordered from the library root down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyLevel {
    /// Level key as stored in the index (`lvl0`, `lvl1`, ...)
    pub level: String,
    pub title: String,
    /// Document path relative to the link prefix
    pub path: String,
}

/// A matched document returned by a search query
///
/// Hits are immutable once received and kept in backend relevance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub library_key: String,
    pub library_name: String,
    pub hierarchy: Vec<HierarchyLevel>,
    /// Content excerpt with `<mark>` highlight spans
    pub content_snippet: String,
    /// Highlighted title per hierarchy level key
    #[serde(default)]
    pub highlighted_titles: BTreeMap<String, String>,
}

impl Hit {
    /// Highlighted title for a level, falling back to the plain title
    pub fn highlighted_title<'a>(&'a self, level: &'a HierarchyLevel) -> &'a str {
        self.highlighted_titles
            .get(&level.level)
            .map(String::as_str)
            .unwrap_or(&level.title)
    }
}

/// A single paginated query against one index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub index_name: String,
    pub query: String,
    /// Filter expression (`field:value` or `NOT field:value`)
    pub filters: String,
    pub hits_per_page: u32,
    pub page: u32,
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<Hit>,
    pub nb_hits: u64,
    pub page: u32,
    pub nb_pages: u32,
}

impl SearchResponse {
    /// Whether no page follows this one
    pub fn is_last_page(&self) -> bool {
        self.page.saturating_add(1) >= self.nb_pages
    }
}

/// The two partitions of the index a session searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeKind {
    /// Documents of the library the page belongs to
    CurrentLibrary,
    /// Documents of every other library
    OtherLibraries,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 2] = [ScopeKind::CurrentLibrary, ScopeKind::OtherLibraries];

    /// The opposite partition
    pub fn other(self) -> Self {
        match self {
            ScopeKind::CurrentLibrary => ScopeKind::OtherLibraries,
            ScopeKind::OtherLibraries => ScopeKind::CurrentLibrary,
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::CurrentLibrary => write!(f, "current-library"),
            ScopeKind::OtherLibraries => write!(f, "other-libraries"),
        }
    }
}

impl std::str::FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" | "current-library" => Ok(ScopeKind::CurrentLibrary),
            "others" | "other-libraries" => Ok(ScopeKind::OtherLibraries),
            other => Err(format!("unknown scope '{}' (use 'current' or 'others')", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_follows_page_count() {
        let mut response = SearchResponse {
            hits: Vec::new(),
            nb_hits: 45,
            page: 0,
            nb_pages: 2,
        };
        assert!(!response.is_last_page());
        response.page = 1;
        assert!(response.is_last_page());
        response.nb_pages = 0;
        response.page = 0;
        assert!(response.is_last_page());
    }

    #[test]
    fn scope_kind_parses_short_and_long_names() {
        assert_eq!("current".parse(), Ok(ScopeKind::CurrentLibrary));
        assert_eq!("other-libraries".parse(), Ok(ScopeKind::OtherLibraries));
        assert!("all".parse::<ScopeKind>().is_err());
        assert_eq!(ScopeKind::CurrentLibrary.other(), ScopeKind::OtherLibraries);
    }

    #[test]
    fn highlighted_title_falls_back_to_plain() {
        let level = HierarchyLevel {
            level: "lvl0".to_string(),
            title: "Vectors".to_string(),
            path: "libs/core/vector.html".to_string(),
        };
        let mut hit = Hit {
            id: "1".to_string(),
            library_key: "core".to_string(),
            library_name: "Core".to_string(),
            hierarchy: vec![level.clone()],
            content_snippet: String::new(),
            highlighted_titles: BTreeMap::new(),
        };
        assert_eq!(hit.highlighted_title(&level), "Vectors");

        hit.highlighted_titles
            .insert("lvl0".to_string(), "<mark>Vector</mark>s".to_string());
        assert_eq!(hit.highlighted_title(&level), "<mark>Vector</mark>s");
    }
}
