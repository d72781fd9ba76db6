//! Configuration management for Adscope.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::icons::{IconConfig, IconTables};
use crate::selectors::PageSelectors;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/adscope/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Page scrolling behaviour
    pub pagination: PaginationConfig,
    /// Summary overlay expansion behaviour
    pub expansion: ExpansionConfig,
    /// Job execution and storage
    pub jobs: JobsConfig,
    /// Public address lookup
    pub egress: EgressConfig,
    /// Page locators
    pub selectors: PageSelectors,
    /// Platform and category icon tables
    pub icons: IconConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults
    /// if the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `ADSCOPE_HEADLESS`: Override browser headless mode (true/false)
    /// - `ADSCOPE_OUTPUT_DIR`: Override the result output directory
    /// - `ADSCOPE_MAX_CONCURRENT_JOBS`: Override the job concurrency limit
    /// - `ADSCOPE_DATABASE_PATH`: Override the job database location
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `ADSCOPE_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("ADSCOPE_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("ADSCOPE_OUTPUT_DIR") {
            tracing::debug!("Override jobs.output_dir from env: {}", val);
            self.jobs.output_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("ADSCOPE_MAX_CONCURRENT_JOBS") {
            if let Ok(max) = val.parse() {
                self.jobs.max_concurrent_jobs = max;
                tracing::debug!("Override jobs.max_concurrent_jobs from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("ADSCOPE_DATABASE_PATH") {
            tracing::debug!("Override jobs.database_path from env: {}", val);
            self.jobs.database_path = Some(PathBuf::from(val));
        }
    }

    /// Reject values that would make the engine loop forever or never run.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pagination.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pagination.max_iterations".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pagination.max_stuck_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pagination.max_stuck_iterations".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.expansion.max_scroll_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "expansion.max_scroll_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs.max_concurrent_jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Icon lookup tables built from the `[icons]` section.
    #[must_use]
    pub fn icon_tables(&self) -> IconTables {
        IconTables::from_config(&self.icons)
    }

    /// Directory results are written to when a request names no absolute
    /// path: `jobs.output_dir`, else `<data dir>/output`.
    pub fn output_dir(&self) -> ConfigResult<PathBuf> {
        match &self.jobs.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("output")),
        }
    }

    /// Job database file: `jobs.database_path`, else `<data dir>/jobs.db`.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.jobs.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("jobs.db")),
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/adscope/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "adscope", "adscope").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/adscope`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "adscope", "adscope").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Default render mode for requests that don't specify one
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Launch Chrome with `--no-sandbox` (needed in most containers)
    pub no_sandbox: bool,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// How long to wait for the first ads to render, in seconds
    pub initial_content_timeout_secs: u64,
    /// Explicit Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            no_sandbox: true,
            navigation_timeout_secs: 30,
            initial_content_timeout_secs: 10,
            executable: None,
        }
    }
}

impl BrowserConfig {
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    #[must_use]
    pub fn initial_content_timeout(&self) -> Duration {
        Duration::from_secs(self.initial_content_timeout_secs)
    }
}

/// Infinite-scroll pagination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Pause after each scroll before reading the page height, in ms
    pub settle_delay_ms: u64,
    /// Bounded wait when probing each end-of-list marker, in ms
    pub end_marker_wait_ms: u64,
    /// Consecutive unchanged heights before the list counts as loaded
    pub max_stuck_iterations: u32,
    /// Hard ceiling on scroll iterations
    pub max_iterations: u32,
    /// Pause after the last scroll before records are enumerated, in ms
    pub final_render_delay_ms: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 700,
            end_marker_wait_ms: 500,
            max_stuck_iterations: 3,
            max_iterations: 500,
            final_render_delay_ms: 1000,
        }
    }
}

impl PaginationConfig {
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    #[must_use]
    pub fn end_marker_wait(&self) -> Duration {
        Duration::from_millis(self.end_marker_wait_ms)
    }

    #[must_use]
    pub fn final_render_delay(&self) -> Duration {
        Duration::from_millis(self.final_render_delay_ms)
    }
}

/// Summary overlay ("See summary details") settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Pause after clicking the details control, in ms
    pub open_delay_ms: u64,
    /// Pause after each overlay scroll, in ms
    pub scroll_settle_ms: u64,
    /// Maximum overlay scrolls before giving up on the declared count
    pub max_scroll_attempts: u32,
    /// Pause after dismissing the overlay, in ms
    pub close_delay_ms: u64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            open_delay_ms: 2000,
            scroll_settle_ms: 1000,
            max_scroll_attempts: 30,
            close_delay_ms: 1000,
        }
    }
}

impl ExpansionConfig {
    #[must_use]
    pub fn open_delay(&self) -> Duration {
        Duration::from_millis(self.open_delay_ms)
    }

    #[must_use]
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    #[must_use]
    pub fn close_delay(&self) -> Duration {
        Duration::from_millis(self.close_delay_ms)
    }
}

/// Job execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Jobs allowed to hold a browser session at the same time
    pub max_concurrent_jobs: usize,
    /// Where result documents are written
    pub output_dir: Option<PathBuf>,
    /// SQLite file holding job state
    pub database_path: Option<PathBuf>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            output_dir: None,
            database_path: None,
        }
    }
}

/// Public address lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EgressConfig {
    /// Whether to look up the public address at all
    pub enabled: bool,
    /// Endpoint returning `{"ip": "..."}`
    pub lookup_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookup_url: "https://api.ipify.org?format=json".to_string(),
            timeout_secs: 10,
        }
    }
}

impl EgressConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.browser.window_width, 1920);
        assert_eq!(config.pagination.settle_delay(), Duration::from_millis(700));
        assert_eq!(config.pagination.max_stuck_iterations, 3);
        assert_eq!(config.pagination.max_iterations, 500);
        assert_eq!(config.expansion.open_delay(), Duration::from_secs(2));
        assert_eq!(config.jobs.max_concurrent_jobs, 2);
        assert!(config.egress.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[browser]"));
        assert!(toml_str.contains("[pagination]"));
        assert!(toml_str.contains("[expansion]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.pagination.max_iterations, config.pagination.max_iterations);
        assert_eq!(parsed.selectors, config.selectors);
        assert_eq!(parsed.icons, config.icons);
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.browser.headless = false;
        config.pagination.settle_delay_ms = 250;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded = AppConfig::load_from(&config_path).expect("load config");
        assert!(!loaded.browser.headless);
        assert_eq!(loaded.pagination.settle_delay_ms, 250);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let tmp = TempDir::new().expect("create temp dir");
        let loaded = AppConfig::load_from(&tmp.path().join("absent.toml")).expect("load");
        assert_eq!(loaded.pagination.max_iterations, 500);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[pagination]\nmax_iterations = 0\n").expect("write");

        let err = AppConfig::load_from(&config_path).expect_err("zero iterations rejected");
        assert!(err.to_string().contains("pagination.max_iterations"));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("ADSCOPE_HEADLESS", "false");
        std::env::set_var("ADSCOPE_MAX_CONCURRENT_JOBS", "4");
        std::env::set_var("ADSCOPE_OUTPUT_DIR", "/tmp/adscope-out");

        let mut config = AppConfig::default();
        config.apply_env();
        assert!(!config.browser.headless);
        assert_eq!(config.jobs.max_concurrent_jobs, 4);
        assert_eq!(
            config.output_dir().expect("output dir"),
            PathBuf::from("/tmp/adscope-out")
        );

        std::env::remove_var("ADSCOPE_HEADLESS");
        std::env::remove_var("ADSCOPE_MAX_CONCURRENT_JOBS");
        std::env::remove_var("ADSCOPE_OUTPUT_DIR");
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[pagination]
settle_delay_ms = 300

[[icons.platforms]]
image = "https://cdn.example.com/sprite.png"
position = "0px 0px"
label = "Example"
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.pagination.settle_delay_ms, 300);
        // These should be defaults
        assert_eq!(config.pagination.max_iterations, 500);
        assert!(config.browser.headless);
        assert_eq!(config.icons.platforms.len(), 1);
        assert_eq!(config.icons.categories.len(), 3);
        assert_eq!(config.icon_tables(), IconTables::from_config(&config.icons));
    }
}
