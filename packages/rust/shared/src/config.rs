//! Application configuration for trawl.
//!
//! User config lives at `~/.trawl/trawl.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrawlError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "trawl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".trawl";

/// Largest file whose content is read into a document, in bytes.
pub const DEFAULT_MAX_CONTENT_BYTES: u64 = 10 * 1024 * 1024;

/// Documents buffered before a mid-crawl flush.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Config structs (matching trawl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// File selection and batching.
    #[serde(default)]
    pub crawler: CrawlerSettings,

    /// Search index location.
    #[serde(default)]
    pub index: IndexSettings,

    /// Backoff applied when the backend is unavailable.
    #[serde(default)]
    pub retry: RetrySettings,
}

/// `[crawler]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerSettings {
    /// Tokens that exclude any path containing them.
    #[serde(default = "default_directories_to_exclude")]
    pub directories_to_exclude: Vec<String>,

    /// File names that are never indexed.
    #[serde(default)]
    pub files_to_exclude: Vec<String>,

    /// File names that are always indexed, whatever the exclusions say.
    #[serde(default)]
    pub files_to_include: Vec<String>,

    /// Extensions that are never indexed.
    #[serde(default = "default_extensions_to_exclude")]
    pub extensions_to_exclude: Vec<String>,

    /// Extensions whose text content is stored.
    #[serde(default = "default_extensions_to_read")]
    pub extensions_to_read: Vec<String>,

    /// Documents buffered before a flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Content size ceiling in bytes.
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            directories_to_exclude: default_directories_to_exclude(),
            files_to_exclude: Vec::new(),
            files_to_include: Vec::new(),
            extensions_to_exclude: default_extensions_to_exclude(),
            extensions_to_read: default_extensions_to_read(),
            batch_size: default_batch_size(),
            max_content_bytes: default_max_content_bytes(),
        }
    }
}

fn default_directories_to_exclude() -> Vec<String> {
    [".svn", ".git", ".hg", "node_modules", "target"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_extensions_to_exclude() -> Vec<String> {
    ["class", "jar", "war", "zip", "gz", "png", "jpg", "gif", "ico", "exe", "dll", "so"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_extensions_to_read() -> Vec<String> {
    [
        "java", "rs", "c", "h", "cpp", "py", "js", "ts", "go", "xml", "html", "css", "sql",
        "properties", "yml", "yaml", "toml", "json", "md", "txt", "sh",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_max_content_bytes() -> u64 {
    DEFAULT_MAX_CONTENT_BYTES
}

/// `[index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Path to the index database; a leading `~/` is expanded.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "~/.trawl/index.db".into()
}

impl IndexSettings {
    /// The database path with `~/` resolved against the home directory.
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        expand_home(&self.database_path)
    }
}

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total write attempts per batch while the backend is unavailable.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Factor applied to the delay after each attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for a single delay in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Randomize each delay to spread out concurrent crawlers.
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    10_000
}
fn default_backoff_multiplier() -> f64 {
    1.0
}
fn default_max_backoff_ms() -> u64 {
    60_000
}

// ---------------------------------------------------------------------------
// Crawl config (runtime snapshot, one per crawl)
// ---------------------------------------------------------------------------

/// Immutable crawl configuration, resolved once at the start of a crawl.
///
/// Extension sets are lower-cased here so matching is a plain set lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    pub directories_to_exclude: HashSet<String>,
    pub files_to_exclude: HashSet<String>,
    pub files_to_include: HashSet<String>,
    pub extensions_to_exclude: HashSet<String>,
    pub extensions_to_read: HashSet<String>,
    pub batch_size: usize,
    pub max_content_bytes: u64,
}

impl TryFrom<&CrawlerSettings> for CrawlConfig {
    type Error = TrawlError;

    fn try_from(settings: &CrawlerSettings) -> Result<Self> {
        if settings.batch_size == 0 {
            return Err(TrawlError::config("crawler.batch_size must be at least 1"));
        }

        Ok(Self {
            directories_to_exclude: settings.directories_to_exclude.iter().cloned().collect(),
            files_to_exclude: settings.files_to_exclude.iter().cloned().collect(),
            files_to_include: settings.files_to_include.iter().cloned().collect(),
            extensions_to_exclude: lower_set(&settings.extensions_to_exclude),
            extensions_to_read: lower_set(&settings.extensions_to_read),
            batch_size: settings.batch_size,
            max_content_bytes: settings.max_content_bytes,
        })
    }
}

fn lower_set(values: &[String]) -> HashSet<String> {
    values.iter().map(|v| v.to_lowercase()).collect()
}

/// Where a crawl reads its configuration from, once per run.
pub trait ConfigSource: Send + Sync {
    /// Resolve a fresh configuration snapshot.
    fn crawl_config(&self) -> Result<CrawlConfig>;
}

/// A fixed snapshot, handed out unchanged to every crawl.
impl ConfigSource for CrawlConfig {
    fn crawl_config(&self) -> Result<CrawlConfig> {
        Ok(self.clone())
    }
}

/// Re-reads the TOML config file on every crawl.
#[derive(Debug, Clone, Default)]
pub struct FileConfigSource {
    /// Explicit config file; `None` uses `~/.trawl/trawl.toml`.
    path: Option<PathBuf>,
}

impl FileConfigSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl ConfigSource for FileConfigSource {
    fn crawl_config(&self) -> Result<CrawlConfig> {
        let app = match &self.path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        CrawlConfig::try_from(&app.crawler)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.trawl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| TrawlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.trawl/trawl.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TrawlError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TrawlError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TrawlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TrawlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TrawlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| TrawlError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}
