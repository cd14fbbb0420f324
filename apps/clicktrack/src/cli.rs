//! # Command Line
//!
//! clap definitions and the command implementations behind them.
//!
//! Every `cmd_*` function takes the database path plus plain arguments so the
//! commands can be driven from tests without parsing a command line.

use crate::api;
use crate::config::{
    DEFAULT_BASE_URL, DEFAULT_HOST, DEFAULT_MAX_ATTEMPTS, DEFAULT_PORT, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RETRY_BACKOFF_MS, ServerConfig,
};
use clap::{Args, Parser, Subcommand};
use clicktrack_core::cache::DEFAULT_CACHE_SIZE;
use clicktrack_core::pagination::DEFAULT_PER_PAGE;
use clicktrack_core::{ClickFilter, PageRequest, Store, TrackerId};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const DEFAULT_DATABASE: &str = "clicktrack.redb";

#[derive(Parser, Debug)]
#[command(name = "clicktrack")]
#[command(author, version, about = "Click tracking short links and sign-up capture", long_about = None)]
pub struct Cli {
    /// Database file
    #[arg(short, long, global = true, env = "CLICKTRACK_DB", default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server and task worker
    Serve(ServeArgs),
    /// Create an empty database
    Init {
        /// Replace an existing database
        #[arg(long)]
        force: bool,
    },
    /// Show row counts
    Status,
    /// Manage trackers
    #[command(subcommand)]
    Tracker(TrackerCommand),
    /// List a tracker's clicks
    Clicks {
        id: u64,
        #[arg(long, default_value = "")]
        campaign: String,
        #[arg(long, default_value = "")]
        source: String,
        #[arg(long, default_value = "")]
        medium: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// List sign-ups
    Signups {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum TrackerCommand {
    /// Create a tracker for a destination URL
    Create {
        url: String,
        #[arg(long, default_value = "")]
        user: String,
    },
    /// List trackers, newest first
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Only trackers owned by this user
        #[arg(long)]
        user: Option<String>,
    },
    /// Change a tracker's destination URL
    Update { id: u64, url: String },
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bearer token for admin routes
    #[arg(long, env = "CLICKTRACK_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Public origin used in QR code links
    #[arg(long, env = "CLICKTRACK_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: usize,

    #[arg(long, default_value_t = DEFAULT_CACHE_SIZE)]
    pub cache_size: usize,

    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = DEFAULT_RETRY_BACKOFF_MS)]
    pub retry_backoff_ms: u64,

    /// Requests per second, 0 for no limit
    #[arg(long, default_value_t = 0)]
    pub rate_limit: u32,

    /// Allowed CORS origin, repeatable. `*` allows any.
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,
}

impl ServeArgs {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            api_key: self.api_key.filter(|key| !key.is_empty()),
            base_url: self.base_url,
            per_page: self.per_page.max(1),
            cache_size: self.cache_size,
            queue_capacity: self.queue_capacity,
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            rate_limit: self.rate_limit,
            cors_origins: self.cors_origins,
        }
    }
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> CliResult {
    let db = cli.database.as_path();
    let json = cli.json;
    match cli.command {
        Command::Serve(args) => {
            let store = Store::open(db)?;
            info!(database = %db.display(), "database opened");
            api::serve(store, args.into_config()).await
        }
        Command::Init { force } => cmd_init(db, force),
        Command::Status => cmd_status(db, json),
        Command::Tracker(TrackerCommand::Create { url, user }) => {
            cmd_tracker_create(db, &url, &user, json)
        }
        Command::Tracker(TrackerCommand::List { page, user }) => {
            cmd_tracker_list(db, user.as_deref(), page, json)
        }
        Command::Tracker(TrackerCommand::Update { id, url }) => {
            cmd_tracker_update(db, id, &url, json)
        }
        Command::Clicks {
            id,
            campaign,
            source,
            medium,
            page,
        } => {
            let filter = ClickFilter {
                campaign,
                source,
                medium,
            };
            cmd_clicks(db, id, &filter, page, json)
        }
        Command::Signups { page } => cmd_signups(db, page, json),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn open_existing(path: &Path) -> Result<Store, Box<dyn std::error::Error + Send + Sync>> {
    if !path.exists() {
        return Err(format!(
            "database {} not found; run `clicktrack init` first",
            path.display()
        )
        .into());
    }
    Ok(Store::open(path)?)
}

fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_page_footer(current: usize, page_count: usize, total: usize) {
    println!("-- page {current} of {page_count} ({total} total)");
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create the database file.
pub fn cmd_init(path: &Path, force: bool) -> CliResult {
    if path.exists() {
        if !force {
            return Err(format!(
                "database {} already exists; use --force to replace it",
                path.display()
            )
            .into());
        }
        std::fs::remove_file(path)?;
    }
    Store::open(path)?;
    println!("Initialized database at {}", path.display());
    Ok(())
}

pub fn cmd_status(path: &Path, json: bool) -> CliResult {
    let stats = open_existing(path)?.stats()?;
    if json {
        return print_json(&stats);
    }
    println!("Database:        {}", path.display());
    println!("Trackers:        {}", stats.trackers);
    println!("Clicks:          {}", stats.clicks);
    println!("Sign-ups:        {}", stats.signups);
    println!("Processed tasks: {}", stats.processed_tasks);
    Ok(())
}

pub fn cmd_tracker_create(path: &Path, url: &str, user: &str, json: bool) -> CliResult {
    let tracker = open_existing(path)?.create_tracker(url, user)?;
    if json {
        return print_json(&tracker);
    }
    println!("Created tracker {} -> {}", tracker.id, tracker.url);
    Ok(())
}

pub fn cmd_tracker_list(path: &Path, user: Option<&str>, page: usize, json: bool) -> CliResult {
    let page = open_existing(path)?.trackers_page(user, &PageRequest::page(page), DEFAULT_PER_PAGE)?;
    if json {
        return print_json(&page);
    }
    for tracker in &page.items {
        println!(
            "{:>6}  {:>8}  {:<12}  {}",
            tracker.id, tracker.count, tracker.user, tracker.url
        );
    }
    print_page_footer(page.current, page.page_count, page.total);
    Ok(())
}

pub fn cmd_tracker_update(path: &Path, id: u64, url: &str, json: bool) -> CliResult {
    let tracker = open_existing(path)?.update_tracker_url(TrackerId(id), url)?;
    if json {
        return print_json(&tracker);
    }
    println!("Updated tracker {} -> {}", tracker.id, tracker.url);
    Ok(())
}

pub fn cmd_clicks(path: &Path, id: u64, filter: &ClickFilter, page: usize, json: bool) -> CliResult {
    let store = open_existing(path)?;
    let id = TrackerId(id);
    if store.tracker(id)?.is_none() {
        return Err(clicktrack_core::Error::TrackerNotFound(id).into());
    }
    let page = store.clicks_page(id, filter, &PageRequest::page(page), DEFAULT_PER_PAGE)?;
    if json {
        return print_json(&page);
    }
    for click in &page.items {
        let a = &click.attribution;
        println!(
            "{:>10}  {:<15}  campaign={} source={} medium={}  {}",
            click.date, click.remote_addr, a.campaign, a.source, a.medium, click.user_agent
        );
    }
    print_page_footer(page.current, page.page_count, page.total);
    Ok(())
}

pub fn cmd_signups(path: &Path, page: usize, json: bool) -> CliResult {
    let page = open_existing(path)?.signups_page(&PageRequest::page(page), DEFAULT_PER_PAGE)?;
    if json {
        return print_json(&page);
    }
    for signup in &page.items {
        println!("{:>10}  {:<15}  {}", signup.date, signup.remote_addr, signup.email_addr);
    }
    print_page_footer(page.current, page.page_count, page.total);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_flags() {
        let cli = Cli::try_parse_from([
            "clicktrack",
            "--database",
            "/tmp/ct.redb",
            "serve",
            "--port",
            "9000",
            "--cors-origin",
            "https://a.example",
            "--cors-origin",
            "https://b.example",
        ])
        .unwrap();
        assert_eq!(cli.database, PathBuf::from("/tmp/ct.redb"));
        let Command::Serve(args) = cli.command else {
            unreachable!("serve subcommand parsed");
        };
        let config = args.into_config();
        assert_eq!(config.port, 9000);
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.per_page, DEFAULT_PER_PAGE);
    }

    #[test]
    fn parses_click_filters() {
        let cli = Cli::try_parse_from(["clicktrack", "--json", "clicks", "4", "--source", "mail"])
            .unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Command::Clicks { id: 4, ref source, page: 1, .. } if source == "mail"
        ));
    }

    #[test]
    fn empty_api_key_means_open() {
        let cli = Cli::try_parse_from(["clicktrack", "serve", "--api-key", ""]).unwrap();
        let Command::Serve(args) = cli.command else {
            unreachable!("serve subcommand parsed");
        };
        assert_eq!(args.into_config().api_key, None);
    }
}
