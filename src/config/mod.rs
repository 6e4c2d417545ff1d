//! Configuration management for isnad
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upstream API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Import pipeline configuration
    #[serde(default)]
    pub import: ImportConfig,

    /// Normalization configuration
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Categorization configuration
    #[serde(default)]
    pub categorize: CategorizeConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Collections seeded by `isnad init`
    #[serde(default = "default_collections")]
    pub collections: Vec<CollectionConfig>,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Upstream corpus API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the corpus API
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// User agent string
    #[serde(default = "default_api_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,

    /// Requests per second, shared across all workers of one import
    #[serde(default = "default_api_requests_per_second")]
    pub requests_per_second: f64,

    /// Retries for timeouts, connection errors and 5xx responses
    #[serde(default = "default_api_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries; attempt `n` waits `n * retry_delay_ms`
    #[serde(default = "default_api_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Import pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Concurrent fetch workers per collection
    #[serde(default = "default_import_workers")]
    pub workers: usize,

    /// Entries per bulk upsert
    #[serde(default = "default_import_batch_size")]
    pub batch_size: usize,

    /// Sub-batch size used when a failed batch is retried
    #[serde(default = "default_import_retry_batch_size")]
    pub retry_batch_size: usize,

    /// Group work by the upstream book listing when available
    #[serde(default = "default_import_use_book_listing")]
    pub use_book_listing: bool,

    /// Stop dispatching new fetches after this many seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

/// Normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Language tag of the primary body (stored as `primary_text`)
    #[serde(default = "default_primary_lang")]
    pub primary_lang: String,

    /// Language tag of the secondary body
    #[serde(default = "default_secondary_lang")]
    pub secondary_lang: String,

    /// Language tag of the tertiary body
    #[serde(default = "default_tertiary_lang")]
    pub tertiary_lang: String,

    /// Entry numbers above this are truncated
    #[serde(default = "default_number_sanity_bound")]
    pub number_sanity_bound: u64,

    /// Leading digits kept on truncation
    #[serde(default = "default_number_keep_digits")]
    pub number_keep_digits: usize,

    /// Strip HTML markup from bodies
    #[serde(default = "default_strip_markup")]
    pub strip_markup: bool,
}

/// Categorization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizeConfig {
    /// Minimum score for a category to be assigned
    #[serde(default = "default_categorize_min_score")]
    pub min_score: i32,

    /// Maximum categories per entry
    #[serde(default = "default_categorize_max_categories")]
    pub max_categories: usize,

    /// Optional TOML taxonomy replacing the built-in one
    #[serde(default)]
    pub taxonomy_file: Option<PathBuf>,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default page size
    #[serde(default = "default_search_per_page")]
    pub default_per_page: u32,

    /// Page sizes above this are clamped
    #[serde(default = "default_search_max_per_page")]
    pub max_per_page: u32,

    /// Default number of suggestions
    #[serde(default = "default_search_suggestions")]
    pub suggestions: usize,
}

/// A collection to seed at bootstrap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Local collection key (e.g. "bukhari")
    pub key: String,

    /// Display name used in reference labels
    pub display_name: String,

    /// Upstream collection slug, defaults to `key`
    #[serde(default)]
    pub api_name: Option<String>,

    /// Expected number of entries
    pub total_entries: u32,

    /// Expected number of books
    #[serde(default)]
    pub total_books: u32,
}

impl CollectionConfig {
    pub fn api_name(&self) -> &str {
        self.api_name.as_deref().unwrap_or(&self.key)
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for isnad data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            import: ImportConfig::default(),
            normalize: NormalizeConfig::default(),
            categorize: CategorizeConfig::default(),
            search: SearchConfig::default(),
            collections: default_collections(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            user_agent: default_api_user_agent(),
            timeout_secs: default_api_timeout(),
            requests_per_second: default_api_requests_per_second(),
            max_retries: default_api_max_retries(),
            retry_delay_ms: default_api_retry_delay_ms(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: default_import_workers(),
            batch_size: default_import_batch_size(),
            retry_batch_size: default_import_retry_batch_size(),
            use_book_listing: default_import_use_book_listing(),
            deadline_secs: None,
        }
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            primary_lang: default_primary_lang(),
            secondary_lang: default_secondary_lang(),
            tertiary_lang: default_tertiary_lang(),
            number_sanity_bound: default_number_sanity_bound(),
            number_keep_digits: default_number_keep_digits(),
            strip_markup: default_strip_markup(),
        }
    }
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            min_score: default_categorize_min_score(),
            max_categories: default_categorize_max_categories(),
            taxonomy_file: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_search_per_page(),
            max_per_page: default_search_max_per_page(),
            suggestions: default_search_suggestions(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Get the API key from environment
    pub fn api_key(&self) -> Option<String> {
        if self.api_key_env.is_empty() {
            return None;
        }
        std::env::var(&self.api_key_env).ok()
    }
}

impl Config {
    /// Get the default base directory for isnad (~/.isnad)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".isnad")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("isnad.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("isnad.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Check if isnad is initialized (config and DB exist)
    pub fn is_initialized(&self) -> bool {
        self.paths.config_file.exists() && self.paths.db_file.exists()
    }

    /// Find a configured collection by key
    pub fn collection(&self, key: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.key == key)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api.requests_per_second <= 0.0 {
            return Err(Error::Config(
                "api.requests_per_second must be positive".to_string(),
            ));
        }

        if self.import.workers == 0 {
            return Err(Error::Config("import.workers must be at least 1".to_string()));
        }

        if self.import.batch_size == 0 {
            return Err(Error::Config(
                "import.batch_size must be at least 1".to_string(),
            ));
        }

        if self.import.retry_batch_size == 0 || self.import.retry_batch_size > self.import.batch_size
        {
            return Err(Error::Config(
                "import.retry_batch_size must be between 1 and import.batch_size".to_string(),
            ));
        }

        if self.normalize.number_keep_digits == 0 {
            return Err(Error::Config(
                "normalize.number_keep_digits must be at least 1".to_string(),
            ));
        }

        if self.normalize.primary_lang == self.normalize.secondary_lang {
            return Err(Error::Config(
                "normalize.primary_lang and normalize.secondary_lang must differ".to_string(),
            ));
        }

        if self.categorize.max_categories == 0 || self.categorize.max_categories > 3 {
            return Err(Error::Config(
                "categorize.max_categories must be between 1 and 3".to_string(),
            ));
        }

        if self.search.max_per_page == 0 || self.search.default_per_page == 0 {
            return Err(Error::Config(
                "search page sizes must be positive".to_string(),
            ));
        }

        let mut keys = std::collections::HashSet::new();
        for collection in &self.collections {
            if !keys.insert(collection.key.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate collection key: {}",
                    collection.key
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(config.import.batch_size, 100);
        assert_eq!(config.search.max_per_page, 100);
        assert_eq!(config.collections.len(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.import.workers = 3;

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.import.workers, 3);
        assert_eq!(loaded.paths.db_file, tmp.path().join("isnad.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [import]
            workers = 2

            [[collections]]
            key = "muslim"
            display_name = "Sahih Muslim"
            total_entries = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.import.workers, 2);
        assert_eq!(config.import.batch_size, 100);
        assert_eq!(config.collections.len(), 1);
        assert_eq!(config.collections[0].api_name(), "muslim");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.import.retry_batch_size = config.import.batch_size + 1;
        assert!(config.validate().is_err());
        config.import.retry_batch_size = 10;
        assert!(config.validate().is_ok());

        config.api.requests_per_second = 0.0;
        assert!(config.validate().is_err());
        config.api.requests_per_second = 5.0;

        config.categorize.max_categories = 4;
        assert!(config.validate().is_err());
        config.categorize.max_categories = 3;

        config.collections.push(config.collections[0].clone());
        assert!(config.validate().is_err());
    }
}
