//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `IVTS_ROOT_FOLDER`
//! 3. `root_folder` key in the user/system TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Service settings live in `<root>/ivts.toml`. A missing file is not an
//! error: a warning is logged and compiled defaults are used.

use crate::{Error, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "IVTS_ROOT_FOLDER";

/// Service settings file name inside the root folder
pub const SERVICE_CONFIG_FILE: &str = "ivts.toml";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "ivts.db";

/// Upper bound for every minute-valued threshold (one week)
pub const MAX_THRESHOLD_MINUTES: i64 = 7 * 24 * 60;

/// Resolves the root folder following the priority order above
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
        }
    }

    /// Set the command-line override
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = root_folder_from_config_file() {
            info!(module = %self.module_name, "Root folder from config file: {}", path.display());
            return path;
        }

        // Priority 4: OS-dependent compiled default
        default_root_folder()
    }
}

/// Locate the user/system config file and read its `root_folder` key
fn root_folder_from_config_file() -> Option<PathBuf> {
    let config_path = locate_config_file()?;
    let toml_content = std::fs::read_to_string(&config_path).ok()?;
    let config = toml::from_str::<toml::Value>(&toml_content).ok()?;
    config
        .get("root_folder")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
}

fn locate_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ivts").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/ivts/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ivts"))
        .unwrap_or_else(|| PathBuf::from("./ivts_data"))
}

/// Creates the root folder and hands out well-known paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root_folder.join(SERVICE_CONFIG_FILE)
    }
}

/// Complete service configuration (`ivts.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 5760,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Upper bound on retrying a write that hit SQLite lock contention
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_lock_wait_ms: 5000,
        }
    }
}

/// Interview lifecycle thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes after `window_end` before an interview times out
    pub completion_grace_minutes: i64,
    /// Maximum gap between candidate and panel responses
    pub idle_gap_minutes: i64,
    /// Store the line that triggered completion before closing the interview
    pub record_completion_line: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            completion_grace_minutes: 30,
            idle_gap_minutes: 15,
            record_completion_line: true,
        }
    }
}

impl SessionConfig {
    pub fn completion_grace(&self) -> Duration {
        Duration::minutes(self.completion_grace_minutes)
    }

    pub fn idle_gap_limit(&self) -> Duration {
        Duration::minutes(self.idle_gap_minutes)
    }
}

/// Archive document format written by the finalization sweep
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    #[default]
    Pdf,
    Text,
}

/// Finalization sweep schedule and behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// In-progress interviews idle longer than this are deleted
    pub stale_after_minutes: i64,
    /// Archive directory; relative paths are resolved against the root folder
    pub archive_dir: PathBuf,
    /// Delete the interview record once its archive is written
    pub purge_processed: bool,
    pub document_format: DocumentFormat,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            stale_after_minutes: 30,
            archive_dir: PathBuf::from("transcripts"),
            purge_processed: true,
            document_format: DocumentFormat::Pdf,
        }
    }
}

impl SweepConfig {
    pub fn stale_after(&self) -> Duration {
        Duration::minutes(self.stale_after_minutes)
    }

    pub fn resolved_archive_dir(&self, root_folder: &Path) -> PathBuf {
        if self.archive_dir.is_absolute() {
            self.archive_dir.clone()
        } else {
            root_folder.join(&self.archive_dir)
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse service config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    ///
    /// A missing file yields defaults (with a warning); an unreadable or
    /// malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Service config not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded service config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.session.completion_grace_minutes < 0 {
            return Err(Error::Config(
                "session.completion_grace_minutes must not be negative".to_string(),
            ));
        }
        if self.session.idle_gap_minutes <= 0 {
            return Err(Error::Config(
                "session.idle_gap_minutes must be positive".to_string(),
            ));
        }
        for (key, minutes) in [
            ("session.completion_grace_minutes", self.session.completion_grace_minutes),
            ("session.idle_gap_minutes", self.session.idle_gap_minutes),
            ("sweep.stale_after_minutes", self.sweep.stale_after_minutes),
        ] {
            if minutes > MAX_THRESHOLD_MINUTES {
                return Err(Error::Config(format!(
                    "{} must not exceed {} minutes, got {}",
                    key, MAX_THRESHOLD_MINUTES, minutes
                )));
            }
        }
        if self.sweep.interval_secs == 0 {
            return Err(Error::Config(
                "sweep.interval_secs must be positive".to_string(),
            ));
        }
        if self.sweep.stale_after_minutes <= 0 {
            return Err(Error::Config(
                "sweep.stale_after_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
