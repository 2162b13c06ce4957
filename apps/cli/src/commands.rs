//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use trawl_crawler::{CrawlStatus, CrawlSummary, Crawler, ProgressReporter, RetryPolicy};
use trawl_shared::{AppConfig, FileConfigSource, init_config, load_config, load_config_from};
use trawl_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// trawl: crawl source trees into a searchable index.
#[derive(Parser)]
#[command(
    name = "trawl",
    version,
    about = "Crawl directory trees into a local full-text index.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a directory tree and index its files.
    Crawl {
        /// Root directory to walk.
        root: PathBuf,

        /// Empty the index before crawling.
        #[arg(long)]
        clear: bool,

        /// Index database (defaults to [index].database_path).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Config file (defaults to ~/.trawl/trawl.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Remove every document from the index.
    Clear {
        /// Index database (defaults to [index].database_path).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Config file (defaults to ~/.trawl/trawl.toml).
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Full-text search over indexed documents.
    Search {
        /// FTS5 query.
        query: String,

        /// Only return documents from this project.
        #[arg(short, long)]
        project: Option<String>,

        /// Maximum number of hits.
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Index database (defaults to [index].database_path).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show document counts per project and version.
    Stats {
        /// Index database (defaults to [index].database_path).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "trawl=info",
        1 => "trawl=debug",
        _ => "trawl=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Crawl {
            root,
            clear,
            db,
            config,
        } => cmd_crawl(&root, clear, db, config).await,
        Command::Clear { db, config } => cmd_clear(db, config).await,
        Command::Search {
            query,
            project,
            limit,
            db,
        } => cmd_search(&query, project.as_deref(), limit, db).await,
        Command::Stats { db } => cmd_stats(db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Load the app config from an explicit file or the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

/// The `--db` flag wins over `[index].database_path`.
fn resolve_db(db: Option<PathBuf>, config: &AppConfig) -> Result<PathBuf> {
    match db {
        Some(p) => Ok(p),
        None => Ok(config.index.resolved_database_path()?),
    }
}

/// A crawler writing to the resolved index database.
async fn open_crawler(
    db: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<(Crawler, PathBuf)> {
    let config = resolve_config(config_path.as_deref())?;
    let db_path = resolve_db(db, &config)?;

    let storage = Arc::new(Storage::open(&db_path).await?);
    let crawler = Crawler::new(storage, Arc::new(FileConfigSource::new(config_path)))
        .with_retry_policy(RetryPolicy::from(&config.retry));
    Ok((crawler, db_path))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(
    root: &Path,
    clear: bool,
    db: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (crawler, db_path) = open_crawler(db, config_path).await?;

    if clear {
        crawler.clear_index().await?;
        info!(db = %db_path.display(), "index cleared");
    }

    info!(root = %root.display(), db = %db_path.display(), "crawling");

    let reporter = CliProgress::new();
    let summary = crawler.crawl(root, &reporter).await;

    print_summary(&summary, &db_path);

    match summary.status {
        CrawlStatus::Completed => Ok(()),
        CrawlStatus::Aborted { reason } => Err(eyre!("crawl aborted: {reason}")),
        CrawlStatus::Rejected => Err(eyre!("a crawl is already running")),
    }
}

fn print_summary(summary: &CrawlSummary, db_path: &Path) {
    println!();
    println!("  Crawl finished: {}", summary.root.display());
    println!("  Seen:     {}", summary.files_seen);
    println!("  Accepted: {}", summary.files_accepted);
    println!("  Skipped:  {}", summary.files_skipped);
    println!("  Batches:  {}", summary.batches_flushed);
    println!("  Indexed:  {}", summary.documents_written);
    if summary.failed_documents > 0 {
        println!("  Failed:   {}", summary.failed_documents);
    }
    if summary.dropped_documents > 0 {
        println!("  Dropped:  {}", summary.dropped_documents);
    }
    println!("  Index:    {}", db_path.display());
    println!("  Time:     {:.1}s", summary.duration.as_secs_f64());
    println!();
}

async fn cmd_clear(db: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let (crawler, db_path) = open_crawler(db, config_path).await?;
    crawler.clear_index().await?;

    println!("Index cleared: {}", db_path.display());
    Ok(())
}

async fn cmd_search(
    query: &str,
    project: Option<&str>,
    limit: u32,
    db: Option<PathBuf>,
) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db, &config)?;

    let storage = Storage::open_readonly(&db_path).await?;
    let hits = storage.search(query, project, limit).await?;

    if hits.is_empty() {
        println!("No matches for '{query}'.");
        return Ok(());
    }

    for hit in &hits {
        let project = hit.project.as_deref().unwrap_or("-");
        println!("{}  [{project}@{}]", hit.path, hit.version);
        if let Some(snippet) = &hit.snippet {
            println!("    {}", snippet.replace('\n', " "));
        }
    }
    println!();
    println!("{} hit(s)", hits.len());
    Ok(())
}

async fn cmd_stats(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(db, &config)?;

    let storage = Storage::open_readonly(&db_path).await?;
    let total = storage.count_documents().await?;
    let projects = storage.list_projects().await?;

    println!("Index: {}", db_path.display());
    println!("Documents: {total}");
    if !projects.is_empty() {
        println!();
        println!("  {:<30} {:<20} {:>10}", "PROJECT", "VERSION", "DOCUMENTS");
        for p in &projects {
            println!(
                "  {:<30} {:<20} {:>10}",
                p.project.as_deref().unwrap_or("(none)"),
                p.version,
                p.documents
            );
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_indexed(&self, path: &str, built: usize) {
        self.spinner.set_message(format!("Reading [{built}] {path}"));
    }

    fn batch_flushed(&self, documents: usize, total_written: usize) {
        self.spinner
            .set_message(format!("Indexed {documents} documents ({total_written} total)"));
    }

    fn done(&self, _summary: &CrawlSummary) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_crawl_flags() {
        let cli = Cli::parse_from(["trawl", "-vv", "crawl", "/svn", "--clear", "--db", "/tmp/i.db"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Crawl {
                root,
                clear,
                db,
                config,
            } => {
                assert_eq!(root, PathBuf::from("/svn"));
                assert!(clear);
                assert_eq!(db, Some(PathBuf::from("/tmp/i.db")));
                assert_eq!(config, None);
            }
            _ => panic!("expected crawl"),
        }
    }

    #[test]
    fn search_defaults() {
        let cli = Cli::parse_from(["trawl", "search", "parser", "--project", "app"]);
        match cli.command {
            Command::Search { query, project, limit, db } => {
                assert_eq!(query, "parser");
                assert_eq!(project.as_deref(), Some("app"));
                assert_eq!(limit, 20);
                assert!(db.is_none());
            }
            _ => panic!("expected search"),
        }
    }

    #[tokio::test]
    async fn clear_goes_through_the_crawler() {
        let dir = std::env::temp_dir().join(format!("trawl-cli-{}", std::process::id()));
        let root = dir.join("tree");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("a.txt"), "alpha").unwrap();

        let db = dir.join("index.db");
        let config = dir.join("trawl.toml");
        std::fs::write(
            &config,
            format!(
                "[crawler]\nextensions_to_read = [\"txt\"]\n\n[index]\ndatabase_path = {:?}\n",
                db.to_string_lossy()
            ),
        )
        .unwrap();

        cmd_crawl(&root, false, None, Some(config.clone())).await.unwrap();
        let storage = Storage::open_readonly(&db).await.unwrap();
        assert_eq!(storage.count_documents().await.unwrap(), 1);
        drop(storage);

        cmd_clear(None, Some(config)).await.unwrap();
        let storage = Storage::open_readonly(&db).await.unwrap();
        assert_eq!(storage.count_documents().await.unwrap(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn parses_clear_config() {
        let cli = Cli::parse_from(["trawl", "clear", "--config", "/etc/trawl.toml"]);
        match cli.command {
            Command::Clear { db, config } => {
                assert!(db.is_none());
                assert_eq!(config, Some(PathBuf::from("/etc/trawl.toml")));
            }
            _ => panic!("expected clear"),
        }
    }

    #[test]
    fn db_flag_overrides_config() {
        let config = AppConfig::default();
        let db = resolve_db(Some(PathBuf::from("/tmp/x.db")), &config).unwrap();
        assert_eq!(db, PathBuf::from("/tmp/x.db"));
    }
}
