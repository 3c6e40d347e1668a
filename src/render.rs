//! Plain-terminal rendering of a search session

use std::fmt::Write;

use crate::links::LinkTarget;
use crate::search::{Hit, ScopeKind, SearchTransport};
use crate::session::{format_count, Navigator, ScopeSnapshot, ScopeStatus, SearchSession};

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Output styling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    pub color: bool,
}

/// Replace `<mark>` spans with bold text, or with asterisks without color
pub fn format_marks(text: &str, style: Style) -> String {
    let (open, close) = if style.color { (BOLD, RESET) } else { ("*", "*") };
    text.replace("<mark>", open).replace("</mark>", close)
}

/// Tab label for a scope: name plus abbreviated count
pub fn tab_label(name: &str, snapshot: Option<&ScopeSnapshot>) -> String {
    let count = snapshot.map(|s| s.total_hits).unwrap_or(0);
    format!("{} ({})", name, format_count(count))
}

/// Render the tab bar, marking the active tab
pub fn render_tabs<T: SearchTransport, N: Navigator>(session: &SearchSession<T, N>) -> String {
    ScopeKind::ALL
        .iter()
        .map(|&kind| {
            let name = match kind {
                ScopeKind::CurrentLibrary => session.library().name.as_str(),
                ScopeKind::OtherLibraries => "Other Libraries",
            };
            let label = tab_label(name, session.scope_snapshot(kind).as_ref());
            if kind == session.active_scope() {
                format!("[{}]", label)
            } else {
                format!(" {} ", label)
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
}

/// Render one scope's hits, or its error notice
pub fn render_scope(
    snapshot: &ScopeSnapshot,
    targets: impl Fn(&Hit) -> Vec<LinkTarget>,
    style: Style,
) -> String {
    let mut out = String::new();

    if let Some(error) = &snapshot.error {
        let _ = writeln!(out, "! {}", error.kind);
        let _ = writeln!(out, "  {}", error.message);
        return out;
    }

    for hit in &snapshot.hits {
        let trail = targets(hit);
        let crumbs = trail
            .iter()
            .map(|t| format_marks(&t.label, style))
            .collect::<Vec<_>>()
            .join(" › ");
        let _ = writeln!(out, "{}", crumbs);
        if let Some(last) = trail.last() {
            let _ = writeln!(out, "  {}", last.href());
        }
        if !hit.content_snippet.is_empty() {
            let _ = writeln!(out, "  {}", format_marks(&hit.content_snippet, style));
        }
        out.push('\n');
    }

    let footer = match snapshot.status {
        ScopeStatus::Loading | ScopeStatus::Stalled => "Loading…".to_string(),
        _ if snapshot.is_last_page => format!("{} of {} shown", snapshot.hits.len(), snapshot.total_hits),
        _ => format!(
            "{} of {} shown, :more for the next page",
            snapshot.hits.len(),
            snapshot.total_hits
        ),
    };
    out.push_str(&footer);
    out.push('\n');
    out
}

/// Render the visible dialog: tabs plus the active scope
pub fn render_session<T: SearchTransport, N: Navigator>(
    session: &SearchSession<T, N>,
    style: Style,
) -> String {
    if !session.is_dialog_open() {
        return "(search dialog closed, :open to show)\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "Search: {}", session.query());
    let _ = writeln!(out, "{}", render_tabs(session));
    out.push('\n');
    if let Some(snapshot) = session.scope_snapshot(session.active_scope()) {
        out.push_str(&render_scope(&snapshot, |hit| session.link_targets(hit), style));
    }
    out
}
