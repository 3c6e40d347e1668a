//! Result link construction
//!
//! The session hands out `(prefix, path)` pairs; [`join_url`] turns one into
//! an absolute link the way url-join does, collapsing the slashes at the seam.

use serde::Serialize;

use crate::search::Hit;

/// A link the renderer can build for a breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkTarget {
    /// Breadcrumb text; may contain `<mark>` spans
    pub label: String,
    pub prefix: String,
    pub path: String,
}

impl LinkTarget {
    pub fn href(&self) -> String {
        join_url(&self.prefix, &self.path)
    }
}

/// Join a base URL and a relative path with exactly one slash between them
pub fn join_url(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{}", path),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}/{}", prefix, path),
    }
}

/// Library landing page followed by one target per hierarchy level
pub fn link_targets(prefix: &str, hit: &Hit) -> Vec<LinkTarget> {
    let mut targets = Vec::with_capacity(hit.hierarchy.len() + 1);
    targets.push(LinkTarget {
        label: hit.library_name.clone(),
        prefix: prefix.to_string(),
        path: join_url("libs", &hit.library_key),
    });
    targets.extend(hit.hierarchy.iter().map(|level| LinkTarget {
        label: hit.highlighted_title(level).to_string(),
        prefix: prefix.to_string(),
        path: level.path.clone(),
    }));
    targets
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::search::HierarchyLevel;

    #[test]
    fn join_collapses_slashes() {
        assert_eq!(join_url("https://www.boost.org/doc/", "/libs/core"), "https://www.boost.org/doc/libs/core");
        assert_eq!(join_url("https://www.boost.org/doc", "libs/core"), "https://www.boost.org/doc/libs/core");
        assert_eq!(join_url("https://www.boost.org/doc/", ""), "https://www.boost.org/doc");
        assert_eq!(join_url("", "libs/core"), "/libs/core");
    }

    #[test]
    fn targets_start_with_library_page() {
        let hit = Hit {
            id: "1".to_string(),
            library_key: "json".to_string(),
            library_name: "JSON".to_string(),
            hierarchy: vec![HierarchyLevel {
                level: "lvl0".to_string(),
                title: "Values".to_string(),
                path: "libs/json/doc/html/values.html".to_string(),
            }],
            content_snippet: String::new(),
            highlighted_titles: BTreeMap::from([("lvl0".to_string(), "<mark>Value</mark>s".to_string())]),
        };

        let targets = link_targets("https://www.boost.org/doc/", &hit);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].label, "JSON");
        assert_eq!(targets[0].href(), "https://www.boost.org/doc/libs/json");
        assert_eq!(targets[1].label, "<mark>Value</mark>s");
        assert_eq!(targets[1].href(), "https://www.boost.org/doc/libs/json/doc/html/values.html");
    }
}
