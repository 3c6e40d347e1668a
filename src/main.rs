//! gecko-search - library-scoped documentation search from the terminal
//!
//! Drives a search session against the configured backend, either for a
//! single query or interactively with an in-memory navigation history.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gecko_search::config::{Config, SearchBackendType};
use gecko_search::links::join_url;
use gecko_search::render::{self, Style};
use gecko_search::search::{Backend, ScopeKind, SearchClient};
use gecko_search::session::{MemoryHistory, SearchSession};

/// Longest wait for a page before rendering what is there
const SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

type Session = SearchSession<Backend, MemoryHistory>;

/// gecko-search - library-scoped documentation search
#[derive(Parser)]
#[command(name = "gecko-search")]
#[command(version)]
#[command(about = "Search one library's documentation and all other libraries side by side", long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Key of the current library (e.g. "json")
    #[arg(long, global = true)]
    library_key: Option<String>,

    /// Display name of the current library
    #[arg(long, global = true)]
    library_name: Option<String>,

    /// Serve results from a JSON records file instead of the hosted index
    #[arg(long, global = true)]
    records: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one query and print the results
    Search {
        /// Search query
        query: String,

        /// Which scope to print
        #[arg(short, long, value_enum, default_value_t = ScopeArg::Both)]
        scope: ScopeArg,

        /// Pages to load per scope
        #[arg(short, long, default_value = "1")]
        pages: u32,
    },

    /// Start an interactive session
    Interactive,

    /// Show the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Current,
    Others,
    Both,
}

impl ScopeArg {
    fn scopes(self) -> Vec<ScopeKind> {
        match self {
            ScopeArg::Current => vec![ScopeKind::CurrentLibrary],
            ScopeArg::Others => vec![ScopeKind::OtherLibraries],
            ScopeArg::Both => ScopeKind::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    apply_overrides(&mut config, &cli);

    // Initialize logging; RUST_LOG takes precedence over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    match cli.command {
        Commands::Search {
            query,
            scope,
            pages,
        } => {
            search_once(&config, &query, scope, pages).await?;
        }

        Commands::Interactive => {
            run_interactive(&config).await?;
        }

        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(key) = &cli.library_key {
        config.library.key = key.clone();
    }
    if let Some(name) = &cli.library_name {
        config.library.name = name.clone();
    }
    if let Some(records) = &cli.records {
        config.backend.kind = SearchBackendType::Memory;
        config.backend.records = Some(records.clone());
    }
}

fn build_session(config: &Config) -> Result<Session> {
    let backend = Backend::from_config(config)?;
    let client = Arc::new(SearchClient::new(backend));

    let page = join_url(
        &config.links.url_prefix,
        &join_url("libs", &config.library.key),
    );
    let history = MemoryHistory::new(page);

    let session = SearchSession::new(config.session_config(), client, history)
        .context("Invalid session configuration")?;
    info!(
        "Session ready for library '{}'",
        session.library().name
    );
    Ok(session)
}

async fn settle(session: &Session) {
    if tokio::time::timeout(SETTLE_TIMEOUT, session.settled()).await.is_err() {
        warn!("Search still running after {:?}", SETTLE_TIMEOUT);
    }
}

fn style() -> Style {
    Style {
        color: std::io::stdout().is_terminal(),
    }
}

/// Run a single query and print each requested scope
async fn search_once(config: &Config, query: &str, scope: ScopeArg, pages: u32) -> Result<()> {
    let mut session = build_session(config)?;
    session.open_dialog();
    session.set_query_string(query);
    settle(&session).await;

    for kind in scope.scopes() {
        for _ in 1..pages {
            if !session.load_more(kind) {
                break;
            }
            settle(&session).await;
        }
    }

    println!("{}", render::render_tabs(&session));
    println!();

    for kind in scope.scopes() {
        let Some(snapshot) = session.scope_snapshot(kind) else {
            continue;
        };
        println!("== {} ==", kind);
        print!(
            "{}",
            render::render_scope(&snapshot, |hit| session.link_targets(hit), style())
        );
        println!();
    }

    Ok(())
}

/// Line-driven session: text sets the query, `:` lines are commands
async fn run_interactive(config: &Config) -> Result<()> {
    let mut session = build_session(config)?;

    println!("Commands: :open :close :back :forward :tab [current|others] :more :quit");
    println!("Any other line sets the query.");
    print!("{}", render::render_session(&session, style()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();

        match line.split_once(' ').unwrap_or((line, "")) {
            (":quit", _) | (":q", _) => break,
            (":open", _) => session.open_dialog(),
            (":close", _) => {
                session.close_dialog();
                session.sync_with_navigator();
            }
            (":back", _) => {
                session.navigator_mut().go_back();
                session.sync_with_navigator();
            }
            (":forward", _) => {
                session.navigator_mut().go_forward();
                session.sync_with_navigator();
            }
            (":tab", "") => session.set_active_scope(session.active_scope().other()),
            (":tab", name) => match name.trim().parse::<ScopeKind>() {
                Ok(kind) => session.set_active_scope(kind),
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            },
            (":more", _) => {
                if !session.load_more(session.active_scope()) {
                    println!("(nothing more to load)");
                }
            }
            (cmd, _) if cmd.starts_with(':') => {
                println!("unknown command {}", cmd);
                continue;
            }
            _ => session.set_query_string(line),
        }

        settle(&session).await;
        if session.take_focus_request() {
            println!("(query input focused)");
        }
        println!("{}", session.navigator().current());
        print!("{}", render::render_session(&session, style()));
    }

    Ok(())
}

/// Print the effective configuration with the API key masked
fn show_config(config: &Config) -> Result<()> {
    let mut shown = config.clone();
    if !shown.backend.api_key.is_empty() {
        shown.backend.api_key = "********".to_string();
    }
    let content = toml::to_string_pretty(&shown).context("Failed to serialize config")?;

    println!("gecko-search Configuration");
    println!("==========================");
    println!("File: {:?}", config.config_path);
    println!();
    print!("{}", content);
    Ok(())
}
