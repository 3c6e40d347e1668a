//! In-memory search transport
//!
//! Serves index records loaded from a JSON file. Matching is a plain
//! case-insensitive term search over titles and content; pagination follows
//! the hosted backend so sessions behave the same against either transport.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::filter::{FilterExpr, LIBRARY_FIELD};
use super::{HierarchyLevel, Hit, SearchError, SearchRequest, SearchResponse, SearchTransport};

const MARK_OPEN: &str = "<mark>";
const MARK_CLOSE: &str = "</mark>";
const SNIPPET_LEAD_WORDS: usize = 8;
const SNIPPET_WORDS: usize = 30;

/// Index record as stored in a records file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub library_key: String,
    #[serde(default)]
    pub library_name: String,
    #[serde(default)]
    pub hierarchy: Vec<RecordLevel>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLevel {
    pub title: String,
    #[serde(default)]
    pub path: String,
}

/// Records served from memory
pub struct MemoryTransport {
    records: Vec<IndexRecord>,
}

impl MemoryTransport {
    pub fn new(records: Vec<IndexRecord>) -> Self {
        Self { records }
    }

    /// Load records from a JSON array file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file: {:?}", path))?;
        let records: Vec<IndexRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse records file: {:?}", path))?;
        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[IndexRecord] {
        &self.records
    }

    /// All records matching a query and filter, best matches first
    fn matching(&self, terms: &[String], filter: Option<&FilterExpr>) -> Vec<&IndexRecord> {
        let mut matched: Vec<(usize, &IndexRecord)> = self
            .records
            .iter()
            .filter(|record| filter.is_none_or(|f| f.matches_value(&record.library_key)))
            .filter_map(|record| score(record, terms).map(|s| (s, record)))
            .collect();

        // Stable: equal scores keep file order
        matched.sort_by(|a, b| b.0.cmp(&a.0));
        matched.into_iter().map(|(_, record)| record).collect()
    }
}

impl SearchTransport for MemoryTransport {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let filter = FilterExpr::parse(&request.filters)?;
        if let Some(f) = &filter {
            if f.field != LIBRARY_FIELD {
                return Err(SearchError::InvalidFilter(format!(
                    "unsupported filter field '{}'",
                    f.field
                )));
            }
        }
        if request.hits_per_page == 0 {
            return Err(SearchError::Status {
                status: 400,
                message: "hitsPerPage must be greater than zero".to_string(),
            });
        }

        let terms = query_terms(&request.query);
        let matched = self.matching(&terms, filter.as_ref());

        let per_page = request.hits_per_page as usize;
        let nb_hits = matched.len();
        let nb_pages = nb_hits.div_ceil(per_page);
        let start = (request.page as usize).saturating_mul(per_page);

        let hits = matched
            .into_iter()
            .skip(start)
            .take(per_page)
            .map(|record| to_hit(record, &terms))
            .collect();

        Ok(SearchResponse {
            hits,
            nb_hits: nb_hits as u64,
            page: request.page,
            nb_pages: nb_pages as u32,
        })
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Match score: `None` unless every term occurs somewhere in the record
fn score(record: &IndexRecord, terms: &[String]) -> Option<usize> {
    let content = record.content.to_ascii_lowercase();
    let library = record.library_name.to_ascii_lowercase();
    let titles: Vec<String> = record
        .hierarchy
        .iter()
        .map(|l| l.title.to_ascii_lowercase())
        .collect();

    let mut title_matches = 0;
    for term in terms {
        let in_title = titles.iter().any(|t| t.contains(term.as_str()));
        if in_title {
            title_matches += 1;
        } else if !content.contains(term.as_str()) && !library.contains(term.as_str()) {
            return None;
        }
    }
    Some(title_matches)
}

fn to_hit(record: &IndexRecord, terms: &[String]) -> Hit {
    let hierarchy: Vec<HierarchyLevel> = record
        .hierarchy
        .iter()
        .enumerate()
        .map(|(i, level)| HierarchyLevel {
            level: format!("lvl{}", i),
            title: level.title.clone(),
            path: level.path.clone(),
        })
        .collect();

    let highlighted_titles = hierarchy
        .iter()
        .map(|level| (level.level.clone(), highlight(&level.title, terms)))
        .collect();

    Hit {
        id: record.object_id.clone(),
        library_key: record.library_key.clone(),
        library_name: record.library_name.clone(),
        hierarchy,
        content_snippet: highlight(&snippet(&record.content, terms), terms),
        highlighted_titles,
    }
}

/// Wrap every case-insensitive occurrence of a term in `<mark>` tags
pub fn highlight(text: &str, terms: &[String]) -> String {
    let lower = text.to_ascii_lowercase();
    let mut marked = vec![false; text.len()];

    for term in terms.iter().filter(|t| !t.is_empty()) {
        let mut from = 0;
        while let Some(pos) = lower[from..].find(term.as_str()) {
            let start = from + pos;
            let end = start + term.len();
            marked[start..end].iter_mut().for_each(|m| *m = true);
            from = end;
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut open = false;
    for (i, ch) in text.char_indices() {
        if marked[i] != open {
            out.push_str(if marked[i] { MARK_OPEN } else { MARK_CLOSE });
            open = marked[i];
        }
        out.push(ch);
    }
    if open {
        out.push_str(MARK_CLOSE);
    }
    out
}

/// Excerpt of the content around the first matching word
fn snippet(content: &str, terms: &[String]) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.len() <= SNIPPET_WORDS {
        return words.join(" ");
    }

    let first_match = words
        .iter()
        .position(|w| {
            let w = w.to_ascii_lowercase();
            terms.iter().any(|t| w.contains(t.as_str()))
        })
        .unwrap_or(0);

    let start = first_match.saturating_sub(SNIPPET_LEAD_WORDS);
    let end = (start + SNIPPET_WORDS).min(words.len());

    let mut out = String::new();
    if start > 0 {
        out.push_str("… ");
    }
    out.push_str(&words[start..end].join(" "));
    if end < words.len() {
        out.push_str(" …");
    }
    out
}
