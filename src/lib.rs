//! gecko-search - library-scoped documentation search
//!
//! A search session runs one query against two partitions of a hosted index:
//! the library the page belongs to and every other library. Results are
//! paginated per partition, and the dialog's visibility follows a URL
//! fragment marker kept in sync with navigation history.

pub mod config;
pub mod links;
pub mod render;
pub mod search;
pub mod session;

pub use config::{Config, ConfigError};
pub use search::{Backend, ScopeKind, SearchClient, SearchError, SearchTransport};
pub use session::{SearchSession, SessionConfig};
