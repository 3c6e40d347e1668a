//! Scope filters and filter expressions
//!
//! A session searches two partitions of the same index: hits of the current
//! library (`library_key:L`) and hits of every other library
//! (`NOT library_key:L`). The two filters are complements of each other, so
//! for any query every hit lands in exactly one scope.

use super::{Hit, ScopeKind, SearchError};

/// Record field the scope filters are built on
pub const LIBRARY_FIELD: &str = "library_key";

/// Filter predicate for one scope of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFilter {
    kind: ScopeKind,
    library_key: String,
}

impl ScopeFilter {
    pub fn new(kind: ScopeKind, library_key: impl Into<String>) -> Self {
        Self {
            kind,
            library_key: library_key.into(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Backend filter expression for this scope
    pub fn expression(&self) -> String {
        self.as_expr().to_string()
    }

    pub fn as_expr(&self) -> FilterExpr {
        FilterExpr {
            field: LIBRARY_FIELD.to_string(),
            value: self.library_key.clone(),
            negated: self.kind == ScopeKind::OtherLibraries,
        }
    }

    /// Whether a hit belongs to this scope
    pub fn matches(&self, hit: &Hit) -> bool {
        let same_library = hit.library_key == self.library_key;
        match self.kind {
            ScopeKind::CurrentLibrary => same_library,
            ScopeKind::OtherLibraries => !same_library,
        }
    }
}

/// A single `field:value` or `NOT field:value` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpr {
    pub field: String,
    pub value: String,
    pub negated: bool,
}

impl FilterExpr {
    /// Parse a filter expression; an empty expression means no filter
    pub fn parse(input: &str) -> Result<Option<Self>, SearchError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }

        let (negated, clause) = match input.strip_prefix("NOT ") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, input),
        };

        let (field, value) = clause
            .split_once(':')
            .ok_or_else(|| SearchError::InvalidFilter(format!("expected field:value in '{}'", input)))?;

        let field = field.trim();
        if field.is_empty() || field.contains(char::is_whitespace) {
            return Err(SearchError::InvalidFilter(format!("bad field name in '{}'", input)));
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        if value.is_empty() {
            return Err(SearchError::InvalidFilter(format!("missing value in '{}'", input)));
        }

        Ok(Some(Self {
            field: field.to_string(),
            value: value.to_string(),
            negated,
        }))
    }

    /// Evaluate against a record field value
    pub fn matches_value(&self, actual: &str) -> bool {
        (actual == self.value) != self.negated
    }
}

impl std::fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "NOT ")?;
        }
        if self.value.contains(|c: char| c.is_whitespace() || c == '"' || c == ':') {
            write!(f, "{}:\"{}\"", self.field, self.value)
        } else {
            write!(f, "{}:{}", self.field, self.value)
        }
    }
}
