use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions accepted by default (lowercase, without the leading dot)
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    // Text
    "txt", "md", "rtf",
    // PDF
    "pdf",
    // Structured data
    "json", "jsonl", "csv", "tsv", "xml",
    // Office
    "docx", "doc", "pptx", "ppt", "xlsx", "xls",
    // Images
    "png", "jpg", "jpeg", "gif",
    // Audio
    "mp3", "wav", "m4a",
    // Video
    "mp4", "avi", "mov",
    // Web
    "html", "htm",
];

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

/// What to ingest and how many workers to use
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Source folder whose files are uploaded
    #[serde(default = "default_folder")]
    pub folder: PathBuf,
    /// Target collection name (created if missing)
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the bounded work queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Walk sub-directories (false = top level only)
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Overall run deadline, counted from the start of the run (setup included)
    #[serde(default)]
    pub run_deadline_secs: Option<u64>,
    /// Request entity/relationship extraction after each upload
    #[serde(default = "default_true")]
    pub extract: bool,
    /// Build the collection graph once all workers finish
    #[serde(default = "default_true")]
    pub build_graph: bool,
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding an optional bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Page size for collection and document listings
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_create_attempts")]
    pub max_create_attempts: usize,
}

/// Extraction polling settings
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_folder() -> PathBuf {
    PathBuf::from("test")
}

fn default_collection() -> String {
    "test-collection".to_string()
}

fn default_workers() -> usize {
    3
}

fn default_queue_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_base_url() -> String {
    "http://localhost:7272".to_string()
}

fn default_api_key_env() -> String {
    "R2R_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_page_size() -> usize {
    100
}

fn default_max_create_attempts() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_extraction_timeout_secs() -> u64 {
    600
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            collection: default_collection(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            recursive: true,
            extensions: default_extensions(),
            run_deadline_secs: None,
            extract: true,
            build_graph: true,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            max_create_attempts: default_max_create_attempts(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// Loads environment variables from .env file (if present) first.
    /// The config file is looked up in this order:
    /// 1. `explicit` path (from `--config`); must exist
    /// 2. Path specified in the INGEST_CONFIG environment variable; must exist
    /// 3. ./ingest.toml in current directory; optional, defaults are used if missing
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let (config_path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => match std::env::var("INGEST_CONFIG") {
                Ok(p) => (PathBuf::from(p), true),
                Err(_) => (PathBuf::from("ingest.toml"), false),
            },
        };

        if !required && !config_path.exists() {
            log::debug!("No {} found, using defaults", config_path.display());
            return Ok(Config::default());
        }

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Call after command-line overrides are applied. The source folder itself
    /// is checked by the discoverer.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.workers == 0 {
            anyhow::bail!("ingest.workers must be greater than 0");
        }

        if self.ingest.queue_capacity == 0 {
            anyhow::bail!("ingest.queue_capacity must be greater than 0");
        }

        if self.ingest.collection.trim().is_empty() {
            anyhow::bail!("ingest.collection must not be empty");
        }

        if self.extension_set().is_empty() {
            anyhow::bail!("ingest.extensions must list at least one non-empty extension");
        }

        url::Url::parse(&self.backend.base_url)
            .with_context(|| format!("backend.base_url is not a valid URL: {}", self.backend.base_url))?;

        if self.backend.page_size == 0 {
            anyhow::bail!("backend.page_size must be greater than 0");
        }

        if self.backend.max_create_attempts == 0 {
            anyhow::bail!("backend.max_create_attempts must be greater than 0");
        }

        if self.extraction.poll_interval_ms == 0 {
            anyhow::bail!("extraction.poll_interval_ms must be greater than 0");
        }

        if self.extraction.timeout_secs == 0 {
            anyhow::bail!("extraction.timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Accepted extensions, normalized to lowercase without a leading dot
    pub fn extension_set(&self) -> BTreeSet<String> {
        self.ingest
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Optional bearer token read from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.backend.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.extraction.poll_interval_ms)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.timeout_secs)
    }

    pub fn run_deadline(&self) -> Option<Duration> {
        self.ingest.run_deadline_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const TEST_CONFIG: &str = r#"
[ingest]
folder = "/data/papers"
collection = "papers"
workers = 8
recursive = false
extensions = [".PDF", "md"]
run_deadline_secs = 900

[backend]
base_url = "http://r2r.internal:7272"
page_size = 50

[extraction]
poll_interval_ms = 500
"#;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.ingest.collection, "test-collection");
        assert_eq!(config.ingest.workers, 3);
        assert!(config.ingest.recursive);
        assert!(config.ingest.extract);
        assert!(config.ingest.build_graph);
        assert_eq!(config.backend.base_url, "http://localhost:7272");
        assert!(config.extension_set().contains("pdf"));
        assert!(config.extension_set().contains("jsonl"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_load_explicit_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ingest.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert_eq!(config.ingest.folder, PathBuf::from("/data/papers"));
        assert_eq!(config.ingest.collection, "papers");
        assert_eq!(config.ingest.workers, 8);
        assert!(!config.ingest.recursive);
        assert_eq!(config.run_deadline(), Some(Duration::from_secs(900)));
        assert_eq!(config.backend.page_size, 50);
        // Unset keys fall back to defaults
        assert_eq!(config.backend.max_create_attempts, 3);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.extraction_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_config_load_from_env_var() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(&config_path, TEST_CONFIG).unwrap();

        let original = std::env::var("INGEST_CONFIG").ok();
        std::env::set_var("INGEST_CONFIG", config_path.to_str().unwrap());
        let config = Config::load(None);
        std::env::remove_var("INGEST_CONFIG");
        if let Some(v) = original {
            std::env::set_var("INGEST_CONFIG", v);
        }

        let config = config.unwrap();
        assert_eq!(config.ingest.collection, "papers");
    }

    #[test]
    fn test_config_missing_explicit_path_is_error() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let result = Config::load(Some(Path::new("definitely-not-here.toml")));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("definitely-not-here.toml"));
    }

    #[test]
    fn test_config_malformed_toml_is_error() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("ingest.toml");
        fs::write(&config_path, "[ingest\nworkers = ").unwrap();
        assert!(Config::load(Some(&config_path)).is_err());
    }

    #[test]
    fn test_extension_set_normalizes() {
        let mut config = Config::default();
        config.ingest.extensions = vec![".PDF".into(), " Md ".into(), "".into()];
        let set = config.extension_set();
        assert_eq!(set.len(), 2);
        assert!(set.contains("pdf"));
        assert!(set.contains("md"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.ingest.workers = 0;
        assert!(config.validate().unwrap_err().to_string().contains("workers"));

        let mut config = Config::default();
        config.ingest.collection = "   ".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.backend.base_url = "not a url".into();
        assert!(config.validate().unwrap_err().to_string().contains("base_url"));

        let mut config = Config::default();
        config.ingest.extensions.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_extensions_and_zero_timeout() {
        let mut config = Config::default();
        config.ingest.extensions = vec!["".into(), " . ".into()];
        assert!(config.validate().unwrap_err().to_string().contains("extensions"));

        let mut config = Config::default();
        config.ingest.extensions = vec!["".into(), ".PDF".into()];
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.extraction.timeout_secs = 0;
        assert!(config.validate().unwrap_err().to_string().contains("timeout_secs"));
    }
}
