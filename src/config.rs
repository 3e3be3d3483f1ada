// Configuration for the annotation client
//
// Configuration is loaded in order of precedence:
// 1. Environment variables (highest priority)
// 2. Config file (~/.config/labelkit/config.toml)
// 3. Built-in defaults (lowest priority)

use crate::engine::EngineConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log file rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            LogRotation::Hourly => "hourly",
            LogRotation::Daily => "daily",
            LogRotation::Never => "never",
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Also write logs to rotating files
    pub file_enabled: bool,
    pub file_dir: PathBuf,
    pub file_prefix: String,
    pub file_rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_enabled: false,
            file_dir: PathBuf::from("./logs"),
            file_prefix: "labelkit".to_string(),
            file_rotation: LogRotation::Daily,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the labeling backend
    pub base_url: String,

    /// Workspace to open
    pub workspace: String,

    /// Category to select on startup (optional; can be chosen later)
    pub category: Option<u32>,

    /// Document to open on startup (optional; defaults to the first)
    pub document: Option<String>,

    /// Elements per page in the main document view
    pub main_page_size: u64,

    /// Elements per page in side panels
    pub sidebar_page_size: u64,

    /// Seconds between model-status polls
    pub poll_interval_secs: u64,

    /// Extra status polls after training evidence disappears.
    /// Covers the window where the completion signal beats the server's
    /// iteration list; a tunable policy, not a correctness knob.
    pub status_check_attempts: u32,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            workspace: String::new(),
            category: None,
            document: None,
            main_page_size: 100,
            sidebar_page_size: 50,
            poll_interval_secs: 5,
            status_check_attempts: 3,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
struct FileLogging {
    level: Option<String>,
    file_enabled: Option<bool>,
    file_dir: Option<String>,
    file_prefix: Option<String>,
    file_rotation: Option<String>,
}

/// Config file structure (subset of Config that makes sense to persist)
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    base_url: Option<String>,
    workspace: Option<String>,
    category: Option<u32>,
    document: Option<String>,
    main_page_size: Option<u64>,
    sidebar_page_size: Option<u64>,
    poll_interval_secs: Option<u64>,
    status_check_attempts: Option<u32>,

    /// Optional [logging] section
    logging: Option<FileLogging>,
}

impl Config {
    /// Get the config file path: ~/.config/labelkit/config.toml
    /// Uses Unix-style ~/.config on all platforms for consistency
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("labelkit").join("config.toml"))
    }

    /// Create config template if it doesn't exist
    /// Called during startup to help users discover configuration options
    pub fn ensure_config_exists() {
        let Some(path) = Self::config_path() else {
            return;
        };

        // Don't overwrite existing config
        if path.exists() {
            return;
        }

        // Create parent directory
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return; // Silently fail - config is optional
            }
        }

        let template = r#"# labelkit configuration
# Uncomment and modify options as needed

# Base URL of the labeling backend (default: http://localhost:8000)
# base_url = "http://localhost:8000"

# Workspace to open
# workspace = "my_workspace"

# Category to select on startup
# category = 0

# Document to open on startup (defaults to the first document)
# document = "my_doc"

# Elements per page: main document view / side panels
# main_page_size = 100
# sidebar_page_size = 50

# Seconds between model-status polls
# poll_interval_secs = 5

# Extra status polls after training evidence disappears
# status_check_attempts = 3

# Logging configuration
# [logging]
# level = "info"          # trace, debug, info, warn, error (RUST_LOG overrides)
# file_enabled = false    # Also write logs to rotating files
# file_dir = "./logs"
# file_prefix = "labelkit"
# file_rotation = "daily" # hourly, daily, never
"#;

        // Write template (ignore errors - config is optional)
        let _ = std::fs::write(&path, template);
    }

    /// Load file config if it exists
    fn load_file_config() -> FileConfig {
        let Some(path) = Self::config_path() else {
            return FileConfig::default();
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                FileConfig::default()
            }),
            Err(_) => FileConfig::default(), // File doesn't exist, use defaults
        }
    }

    /// Serialize config to TOML string (single source of truth for format)
    pub fn to_toml(&self) -> String {
        format!(
            r#"# labelkit configuration

# Base URL of the labeling backend
base_url = "{base_url}"

# Workspace to open
workspace = "{workspace}"

# Elements per page: main document view / side panels
main_page_size = {main_page_size}
sidebar_page_size = {sidebar_page_size}

# Seconds between model-status polls
poll_interval_secs = {poll_interval}

# Extra status polls after training evidence disappears
status_check_attempts = {attempts}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = "{log_level}"
file_enabled = {file_enabled}
file_dir = "{file_dir}"
file_prefix = "{file_prefix}"
file_rotation = "{file_rotation}"
"#,
            base_url = self.base_url,
            workspace = self.workspace,
            main_page_size = self.main_page_size,
            sidebar_page_size = self.sidebar_page_size,
            poll_interval = self.poll_interval_secs,
            attempts = self.status_check_attempts,
            log_level = self.logging.level,
            file_enabled = self.logging.file_enabled,
            file_dir = self.logging.file_dir.display(),
            file_prefix = self.logging.file_prefix,
            file_rotation = self.logging.file_rotation.as_str(),
        )
    }

    /// Load configuration: env vars > file > defaults
    pub fn from_env() -> Self {
        let file = Self::load_file_config();
        let defaults = Config::default();

        let base_url = std::env::var("LABELKIT_BASE_URL")
            .ok()
            .or(file.base_url)
            .unwrap_or(defaults.base_url);

        let workspace = std::env::var("LABELKIT_WORKSPACE")
            .ok()
            .or(file.workspace)
            .unwrap_or(defaults.workspace);

        let category = std::env::var("LABELKIT_CATEGORY")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.category);

        let document = std::env::var("LABELKIT_DOCUMENT").ok().or(file.document);

        let main_page_size = file.main_page_size.unwrap_or(defaults.main_page_size).max(1);
        let sidebar_page_size = file
            .sidebar_page_size
            .unwrap_or(defaults.sidebar_page_size)
            .max(1);

        let poll_interval_secs = std::env::var("LABELKIT_POLL_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .or(file.poll_interval_secs)
            .unwrap_or(defaults.poll_interval_secs)
            .max(1);

        let status_check_attempts = file
            .status_check_attempts
            .unwrap_or(defaults.status_check_attempts);

        let file_logging = file.logging.unwrap_or_default();
        let logging_defaults = LoggingConfig::default();
        let logging = LoggingConfig {
            level: file_logging.level.unwrap_or(logging_defaults.level),
            file_enabled: file_logging
                .file_enabled
                .unwrap_or(logging_defaults.file_enabled),
            file_dir: file_logging
                .file_dir
                .map(PathBuf::from)
                .unwrap_or(logging_defaults.file_dir),
            file_prefix: file_logging
                .file_prefix
                .unwrap_or(logging_defaults.file_prefix),
            file_rotation: file_logging
                .file_rotation
                .as_deref()
                .map(LogRotation::parse)
                .unwrap_or(logging_defaults.file_rotation),
        };

        Config {
            base_url,
            workspace,
            category,
            document,
            main_page_size,
            sidebar_page_size,
            poll_interval_secs,
            status_check_attempts,
            logging,
        }
    }

    /// The engine's slice of the configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            main_page_size: self.main_page_size,
            sidebar_page_size: self.sidebar_page_size,
            status_check_attempts: self.status_check_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.main_page_size, 100);
        assert_eq!(config.sidebar_page_size, 50);
        assert_eq!(config.status_check_attempts, 3);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.file_enabled);
    }

    #[test]
    fn test_to_toml_round_trips_through_file_config() {
        let mut config = Config::default();
        config.workspace = "ws1".into();
        config.main_page_size = 250;
        config.logging.file_rotation = LogRotation::Hourly;

        let parsed: FileConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.workspace.as_deref(), Some("ws1"));
        assert_eq!(parsed.main_page_size, Some(250));
        assert_eq!(
            parsed.logging.unwrap().file_rotation.as_deref(),
            Some("hourly")
        );
    }

    #[test]
    fn test_log_rotation_parse() {
        assert_eq!(LogRotation::parse("hourly"), LogRotation::Hourly);
        assert_eq!(LogRotation::parse("NEVER"), LogRotation::Never);
        // Unknown values fall back to daily
        assert_eq!(LogRotation::parse("weekly"), LogRotation::Daily);
    }

    #[test]
    fn test_engine_config_projection() {
        let mut config = Config::default();
        config.main_page_size = 10;
        config.status_check_attempts = 7;
        let engine = config.engine_config();
        assert_eq!(engine.main_page_size, 10);
        assert_eq!(engine.status_check_attempts, 7);
    }
}
