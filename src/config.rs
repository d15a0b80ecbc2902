use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::ItemType;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Content store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_schema_cache_capacity")]
    pub schema_cache_capacity: usize,
}

fn default_schema_cache_capacity() -> usize {
    256
}

/// Discovery and presentation settings.
///
/// `initial_display_limit` and `show_type_label` only affect how results are
/// shown; the engine never truncates or relabels anything.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySettings {
    #[serde(default = "default_true")]
    pub enable_nested_discovery: bool,
    #[serde(default = "default_initial_display_limit")]
    pub initial_display_limit: usize,
    #[serde(default)]
    pub show_type_label: bool,
    #[serde(default = "default_target_types")]
    pub target_types: Vec<ItemType>,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            enable_nested_discovery: true,
            initial_display_limit: default_initial_display_limit(),
            show_type_label: false,
            target_types: default_target_types(),
            store_timeout_ms: default_store_timeout_ms(),
            request_deadline_ms: default_request_deadline_ms(),
            max_nesting_depth: default_max_nesting_depth(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_initial_display_limit() -> usize {
    10
}

fn default_target_types() -> Vec<ItemType> {
    ItemType::ALL.to_vec()
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_request_deadline_ms() -> u64 {
    10_000
}

fn default_max_nesting_depth() -> usize {
    16
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in RELMAP_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("RELMAP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))
    }

    /// Parse and validate a TOML document without touching the environment.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let discovery = &self.discovery;

        if !(1..=100).contains(&discovery.initial_display_limit) {
            anyhow::bail!("discovery.initial_display_limit must be between 1 and 100");
        }

        if discovery.target_types.is_empty() {
            anyhow::bail!("discovery.target_types must name at least one item type");
        }

        if discovery.store_timeout_ms == 0 || discovery.request_deadline_ms == 0 {
            anyhow::bail!("discovery.store_timeout_ms and discovery.request_deadline_ms must be greater than 0");
        }

        if discovery.store_timeout_ms > discovery.request_deadline_ms {
            anyhow::bail!("discovery.store_timeout_ms must not exceed discovery.request_deadline_ms");
        }

        if discovery.max_nesting_depth == 0 {
            anyhow::bail!("discovery.max_nesting_depth must be greater than 0");
        }

        if self.store.schema_cache_capacity == 0 {
            anyhow::bail!("store.schema_cache_capacity must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.store.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Serialize config tests that mutate process-wide cwd and env so they don't race.
    static CONFIG_TEST_LOCK: Mutex<()> = Mutex::new(());

    const MINIMAL: &str = r#"
[store]
db_path = "./relmap.db"
"#;

    /// Restores cwd when dropped (e.g. on panic).
    struct CwdGuard(PathBuf);
    impl Drop for CwdGuard {
        fn drop(&mut self) {
            let _ = std::env::set_current_dir(&self.0);
        }
    }

    fn with_config_env(config_path: Option<&Path>, f: impl FnOnce()) {
        let original = std::env::var("RELMAP_CONFIG").ok();
        match config_path {
            Some(path) => std::env::set_var("RELMAP_CONFIG", path),
            None => std::env::remove_var("RELMAP_CONFIG"),
        }
        f();
        std::env::remove_var("RELMAP_CONFIG");
        if let Some(val) = original {
            std::env::set_var("RELMAP_CONFIG", val);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.db_path(), Path::new("./relmap.db"));
        assert_eq!(config.store.schema_cache_capacity, 256);
        assert!(config.discovery.enable_nested_discovery);
        assert_eq!(config.discovery.initial_display_limit, 10);
        assert!(!config.discovery.show_type_label);
        assert_eq!(config.discovery.target_types, ItemType::ALL.to_vec());
        assert_eq!(config.discovery.store_timeout_ms, 2000);
        assert_eq!(config.discovery.request_deadline_ms, 10_000);
        assert_eq!(config.discovery.max_nesting_depth, 16);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
[store]
db_path = "/var/lib/relmap/content.db"
schema_cache_capacity = 32

[discovery]
enable_nested_discovery = false
initial_display_limit = 25
show_type_label = true
target_types = ["document", "media-asset"]
store_timeout_ms = 500
request_deadline_ms = 500
max_nesting_depth = 4

[logging]
log_level = "debug"
"#,
        )
        .unwrap();
        assert!(!config.discovery.enable_nested_discovery);
        assert_eq!(config.discovery.initial_display_limit, 25);
        assert_eq!(
            config.discovery.target_types,
            vec![ItemType::Document, ItemType::MediaAsset]
        );
        assert_eq!(config.store.schema_cache_capacity, 32);
        assert_eq!(config.logging.log_level, "debug");
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            ("initial_display_limit = 0", "initial_display_limit"),
            ("initial_display_limit = 101", "initial_display_limit"),
            ("target_types = []", "target_types"),
            ("store_timeout_ms = 0", "greater than 0"),
            ("store_timeout_ms = 20000", "must not exceed"),
            ("max_nesting_depth = 0", "max_nesting_depth"),
        ];
        for (line, expected) in cases {
            let toml = format!("{}\n[discovery]\n{}\n", MINIMAL, line);
            let err = Config::from_toml_str(&toml).unwrap_err();
            assert!(err.to_string().contains(expected), "{}: {}", line, err);
        }
    }

    #[test]
    fn test_unknown_item_type_rejected() {
        let toml = format!("{}\n[discovery]\ntarget_types = [\"page\"]\n", MINIMAL);
        assert!(Config::from_toml_str(&toml).is_err());
    }

    #[test]
    fn test_config_load_from_env_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("relmap.toml");
        fs::write(&config_path, format!("{}\n[logging]\nlog_level = \"warn\"\n", MINIMAL)).unwrap();

        with_config_env(Some(config_path.as_path()), || {
            let config = Config::load();
            assert!(config.is_ok(), "Config::load() failed: {:?}", config.err());
            assert_eq!(config.unwrap().logging.log_level, "warn");
        });
    }

    #[test]
    fn test_config_path_from_env_file() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("custom.toml"), MINIMAL).unwrap();
        fs::write(temp_dir.path().join(".env"), "RELMAP_CONFIG=custom.toml\n").unwrap();

        let original_dir = std::env::current_dir().unwrap();
        let _cwd = CwdGuard(original_dir);
        std::env::set_current_dir(temp_dir.path()).unwrap();
        with_config_env(None, || {
            let config = Config::load();
            assert!(config.is_ok(), "Config should load via .env: {:?}", config.err());
        });
    }

    #[test]
    fn test_config_invalid_path() {
        let _lock = CONFIG_TEST_LOCK.lock().unwrap();
        with_config_env(Some(Path::new("nonexistent.toml")), || {
            let err = Config::load().unwrap_err();
            assert!(err.to_string().contains("nonexistent.toml"));
        });
    }
}
