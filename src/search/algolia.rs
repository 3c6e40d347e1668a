//! Algolia search transport
//!
//! Queries a hosted index over the REST search API. Only the read path is
//! implemented; the key configured here should be a search-only key.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use super::{HierarchyLevel, Hit, SearchError, SearchRequest, SearchResponse, SearchTransport};
use crate::config::BackendConfig;

const HIGHLIGHT_PRE_TAG: &str = "<mark>";
const HIGHLIGHT_POST_TAG: &str = "</mark>";
const SNIPPET_WORDS: u32 = 30;

/// Hosted index transport
pub struct AlgoliaTransport {
    http: reqwest::Client,
    base_url: String,
}

impl AlgoliaTransport {
    /// Create a transport for an application; `host` overrides the DSN host
    pub fn new(
        app_id: &str,
        api_key: &str,
        host: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-algolia-application-id",
            HeaderValue::from_str(app_id)
                .map_err(|e| SearchError::Network(format!("invalid application id: {}", e)))?,
        );
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|e| SearchError::Network(format!("invalid api key: {}", e)))?;
        key.set_sensitive(true);
        headers.insert("x-algolia-api-key", key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let base_url = match host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://{}-dsn.algolia.net", app_id.to_lowercase()),
        };

        Ok(Self { http, base_url })
    }

    pub fn from_config(backend: &BackendConfig) -> Result<Self, SearchError> {
        Self::new(
            &backend.app_id,
            &backend.api_key,
            backend.host.as_deref(),
            Duration::from_millis(backend.timeout_ms),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn query_url(&self, index_name: &str) -> String {
        format!(
            "{}/1/indexes/{}/query",
            self.base_url,
            urlencoding::encode(index_name)
        )
    }
}

/// URL-encoded `params` string for the query body
pub fn encode_params(request: &SearchRequest) -> String {
    let snippet = format!("content:{}", SNIPPET_WORDS);
    let hits_per_page = request.hits_per_page.to_string();
    let page = request.page.to_string();

    let mut pairs: Vec<(&str, &str)> = vec![("query", request.query.as_str())];
    if !request.filters.is_empty() {
        pairs.push(("filters", request.filters.as_str()));
    }
    pairs.extend([
        ("hitsPerPage", hits_per_page.as_str()),
        ("page", page.as_str()),
        ("highlightPreTag", HIGHLIGHT_PRE_TAG),
        ("highlightPostTag", HIGHLIGHT_POST_TAG),
        ("attributesToSnippet", snippet.as_str()),
    ]);

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl SearchTransport for AlgoliaTransport {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let body = serde_json::json!({ "params": encode_params(request) });

        let response = self
            .http
            .post(self.query_url(&request.index_name))
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SearchError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiErrorBody>(&bytes)
                .map(|body| body.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(SearchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let raw: RawResponse =
            serde_json::from_slice(&bytes).map_err(|e| SearchError::Decode(e.to_string()))?;
        debug!(
            "Algolia returned {} hits (page {}/{}, {} total)",
            raw.hits.len(),
            raw.page,
            raw.nb_pages,
            raw.nb_hits
        );
        Ok(raw.into_response())
    }

    fn name(&self) -> &'static str {
        "Algolia"
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResponse {
    hits: Vec<RawHit>,
    nb_hits: u64,
    page: u32,
    nb_pages: u32,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "objectID")]
    object_id: String,
    #[serde(default)]
    library_key: String,
    #[serde(default)]
    library_name: String,
    #[serde(default)]
    hierarchy: BTreeMap<String, Option<RawLevel>>,
    #[serde(default)]
    content: Option<String>,
    #[serde(rename = "_highlightResult", default)]
    highlight: Option<RawHighlight>,
    #[serde(rename = "_snippetResult", default)]
    snippet: Option<RawSnippet>,
}

#[derive(Deserialize)]
struct RawLevel {
    title: String,
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
struct RawHighlight {
    #[serde(default)]
    hierarchy: BTreeMap<String, Option<RawHighlightLevel>>,
}

#[derive(Deserialize)]
struct RawHighlightLevel {
    title: Option<MarkedValue>,
}

#[derive(Deserialize)]
struct RawSnippet {
    content: Option<MarkedValue>,
}

#[derive(Deserialize)]
struct MarkedValue {
    value: String,
}

/// Numeric rank of a `lvlN` key; unknown keys sort last
fn level_rank(key: &str) -> u32 {
    key.strip_prefix("lvl")
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

impl RawResponse {
    fn into_response(self) -> SearchResponse {
        SearchResponse {
            hits: self.hits.into_iter().map(RawHit::into_hit).collect(),
            nb_hits: self.nb_hits,
            page: self.page,
            nb_pages: self.nb_pages,
        }
    }
}

impl RawHit {
    fn into_hit(self) -> Hit {
        let mut hierarchy: Vec<HierarchyLevel> = self
            .hierarchy
            .into_iter()
            .filter_map(|(level, node)| {
                node.map(|node| HierarchyLevel {
                    level,
                    title: node.title,
                    path: node.path,
                })
            })
            .collect();
        hierarchy.sort_by_key(|level| level_rank(&level.level));

        let highlighted_titles = self
            .highlight
            .map(|h| {
                h.hierarchy
                    .into_iter()
                    .filter_map(|(level, node)| {
                        node.and_then(|n| n.title).map(|title| (level, title.value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content_snippet = self
            .snippet
            .and_then(|s| s.content)
            .map(|c| c.value)
            .or(self.content)
            .unwrap_or_default();

        Hit {
            id: self.object_id,
            library_key: self.library_key,
            library_name: self.library_name,
            hierarchy,
            content_snippet,
            highlighted_titles,
        }
    }
}
